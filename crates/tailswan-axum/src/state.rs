//! Shared application state type.

use std::sync::Arc;

use tailswan_runtime::EventBroadcaster;

/// Services reachable from handlers.
#[derive(Debug)]
pub struct EventsContext {
    pub broadcaster: Arc<EventBroadcaster>,
}

/// Application state shared across all handlers.
pub type AppState = Arc<EventsContext>;

/// Build the shared state around a broadcaster.
pub fn app_state(broadcaster: Arc<EventBroadcaster>) -> AppState {
    Arc::new(EventsContext { broadcaster })
}
