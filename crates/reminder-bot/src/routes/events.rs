//! Inbound event feed.

use axum::extract::State;
use axum::Json;
use dispatcher::EventBatch;
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::state::AppState;

/// Per-request processing summary.
#[derive(Debug, Default, Serialize)]
pub struct EventsResponse {
    /// Events dispatched successfully.
    pub handled: usize,
    /// Event types the bot does not handle.
    pub ignored: usize,
    /// Records dropped for missing or invalid fields.
    pub malformed: usize,
    /// Events aborted by a repository failure.
    pub failed: usize,
}

/// Accept one event record or `{"events": [...]}`.
///
/// Events are dispatched in order. Failures are counted, never turned into
/// an error status, so the transport does not redeliver the whole batch.
pub async fn receive(
    State(state): State<AppState>,
    Json(batch): Json<EventBatch>,
) -> Json<EventsResponse> {
    let mut summary = EventsResponse::default();

    for raw in batch.into_events() {
        let kind = raw.kind.clone();
        match raw.into_event() {
            Ok(Some(event)) => match state.dispatcher.handle(event).await {
                Ok(outcome) => {
                    debug!("{} event: {:?}", kind, outcome);
                    summary.handled += 1;
                }
                Err(e) => {
                    error!("Failed to handle {} event: {}", kind, e);
                    summary.failed += 1;
                }
            },
            Ok(None) => {
                debug!("Ignoring {} event", kind);
                summary.ignored += 1;
            }
            Err(e) => {
                warn!("Dropping {} event: {}", kind, e);
                summary.malformed += 1;
            }
        }
    }

    Json(summary)
}
