//! Reminder timers.
//!
//! [`JobScheduler`] keeps one pending job per `(user, reminder)`: a `Fire`
//! job that notifies the user, followed by an `Expire` job that deletes the
//! row once the grace window is over. Jobs live in memory only; on startup
//! [`JobScheduler::rehydrate`] rebuilds them from the database.
//!
//! [`UserLocks`] serializes all work on a single user's state and is shared
//! with the conversation dispatcher.

pub mod error;
pub mod locks;
pub mod scheduler;

pub use error::{Result, SchedulerError};
pub use locks::UserLocks;
pub use scheduler::{
    JobKind, JobScheduler, RehydrationReport, ScheduleOutcome, SchedulerConfig, SchedulerHandle,
};
