//! Error types for event dispatch.

use database::DatabaseError;
use thiserror::Error;

/// Errors that abort handling of an inbound event.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The repository could not be read or written.
    #[error("repository unavailable: {0}")]
    RepositoryUnavailable(#[from] DatabaseError),

    /// The event is missing required fields or carries unparseable data.
    #[error("malformed event: {0}")]
    MalformedEvent(String),
}

/// Result type for dispatch operations.
pub type Result<T> = std::result::Result<T, DispatchError>;
