//! Scheduler error types.

use thiserror::Error;

/// Errors raised by scheduler callbacks and rehydration.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Repository read or write failed.
    #[error("database error: {0}")]
    Database(#[from] database::DatabaseError),
}

/// Result type for scheduler operations.
pub type Result<T> = std::result::Result<T, SchedulerError>;
