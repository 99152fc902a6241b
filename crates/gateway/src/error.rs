//! Error types for gateway operations.

use thiserror::Error;

/// Errors that can occur while delivering outbound messages.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The transport answered with a non-success status.
    #[error("transport rejected message ({status}): {body}")]
    Rejected { status: u16, body: String },

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The transport is not accepting messages.
    #[error("gateway unavailable: {0}")]
    Unavailable(String),
}
