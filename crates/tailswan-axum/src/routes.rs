//! Route definitions and router construction.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::sse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthBody {
    pub status: &'static str,
    pub clients: usize,
}

/// `GET /health`
async fn health(State(state): State<AppState>) -> Json<HealthBody> {
    Json(HealthBody {
        status: "ok",
        clients: state.broadcaster.client_count().await,
    })
}

/// Build the router for the event feed.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/events", get(sse::events))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
