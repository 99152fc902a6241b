//! Route handlers for the event feed.

pub mod events;
pub mod health;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// Build the router with all routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/events", post(events::receive))
        .route("/health", get(health::health))
}
