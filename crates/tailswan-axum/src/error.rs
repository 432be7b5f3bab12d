//! Axum-specific error types and mappings.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tailswan_runtime::BroadcastError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HttpError {
    /// The event feed is shut down or cannot accept the client.
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    status: u16,
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };
        let body = ErrorBody {
            error: message,
            status: status.as_u16(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<BroadcastError> for HttpError {
    fn from(err: BroadcastError) -> Self {
        match err {
            BroadcastError::Closed => Self::ServiceUnavailable(err.to_string()),
            BroadcastError::AlreadyRegistered(_) => Self::Internal(err.to_string()),
        }
    }
}
