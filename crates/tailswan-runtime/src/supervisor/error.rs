use tailswan_core::{ConfigError, ControlError};
use thiserror::Error;

use super::readiness::ReadinessError;
use super::{Service, SessionState};
use crate::process::ProcessError;

/// Errors from supervisor operations.
///
/// Everything except [`SupervisorError::ProcessExited`] is returned from
/// `start`; `ProcessExited` is delivered on the error channel.
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("cannot start a session that is {0}")]
    InvalidState(SessionState),

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to start {service}: {source}")]
    StartProcess {
        service: Service,
        #[source]
        source: ProcessError,
    },

    #[error("mesh daemon did not become ready: {0}")]
    MeshNotReady(#[source] ReadinessError),

    #[error("Failed to bring mesh up: {0}")]
    MeshUp(#[source] ControlError),

    #[error("Failed to enable serve configuration: {0}")]
    ServeConfig(#[source] ControlError),

    #[error("startup cancelled")]
    Cancelled,

    #[error("{service} exited unexpectedly: {reason}")]
    ProcessExited { service: Service, reason: String },
}
