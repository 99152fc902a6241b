//! Error types for HTTP handlers.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

/// Errors that can occur in HTTP handlers.
#[derive(Debug, Error)]
pub enum BotError {
    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] database::DatabaseError),
}

impl IntoResponse for BotError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            BotError::Database(err) => {
                tracing::error!("Database error: {}", err);
                (StatusCode::SERVICE_UNAVAILABLE, err.to_string())
            }
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}

/// Result type for handlers.
pub type Result<T> = std::result::Result<T, BotError>;
