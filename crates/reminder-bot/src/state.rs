//! Application state shared across handlers.

use std::sync::Arc;

use database::Database;
use dispatcher::Dispatcher;
use scheduler::JobScheduler;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Database connection.
    pub db: Database,
    /// Conversation dispatcher.
    pub dispatcher: Arc<Dispatcher>,
    /// Reminder timers.
    pub scheduler: JobScheduler,
}

impl AppState {
    /// Create new application state.
    pub fn new(db: Database, dispatcher: Arc<Dispatcher>, scheduler: JobScheduler) -> Self {
        Self {
            db,
            dispatcher,
            scheduler,
        }
    }
}
