//! Health check endpoint.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::error::Result;
use crate::state::AppState;

#[derive(Serialize)]
pub struct Health {
    pub status: String,
    pub sessions: i64,
    pub pending_jobs: usize,
}

/// Health check endpoint.
pub async fn health(State(state): State<AppState>) -> Result<Json<Health>> {
    let sessions = database::session::count_sessions(state.db.pool()).await?;

    Ok(Json(Health {
        status: "ok".to_string(),
        sessions,
        pending_jobs: state.scheduler.len(),
    }))
}
