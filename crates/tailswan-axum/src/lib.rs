//! Axum adapter for the tailswan event feed.
//!
//! Exposes an [`EventBroadcaster`](tailswan_runtime::EventBroadcaster) as a
//! Server-Sent Events stream at `GET /api/events`, plus `GET /health`.

#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

#[cfg(test)]
use bytes as _;
#[cfg(test)]
use http_body_util as _;
#[cfg(test)]
use serde_json as _;
#[cfg(test)]
use tower as _;

pub mod error;
pub mod routes;
pub mod server;
pub mod sse;
pub mod state;

pub use error::HttpError;
pub use routes::create_router;
pub use server::{bind, start_server};
pub use state::{AppState, EventsContext, app_state};
