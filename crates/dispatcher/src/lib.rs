//! Conversation handling for the reminder bot.
//!
//! Each user is in one of three states:
//!
//! - `Idle`: free text becomes a new reminder awaiting a time
//! - `AwaitingTime`: a date picker answer schedules the pending reminder
//! - `AwaitingCancelSelection`: the next text names reminders to remove
//!
//! `help` and `list` work in every state. Command keywords are accepted in
//! English and Japanese (see [`Command`]).

pub mod commands;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod replies;

pub use commands::Command;
pub use dispatcher::{DispatchOutcome, Dispatcher, DispatcherConfig, Rejection};
pub use error::{DispatchError, Result};
pub use events::{EventBatch, InboundEvent, Postback, RawEvent};
