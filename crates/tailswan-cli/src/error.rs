//! CLI error type and exit codes.

use tailswan_core::{ConfigError, ControlError};
use tailswan_runtime::{HealthError, HostSetupError, SupervisorError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Host setup failed: {0}")]
    HostSetup(#[from] HostSetupError),

    #[error("Startup failed: {0}")]
    Startup(#[source] SupervisorError),

    /// A supervised process died while the session was running.
    #[error("{0}")]
    ProcessExited(#[source] SupervisorError),

    #[error("Unhealthy: {0}")]
    Health(#[from] HealthError),

    #[error(transparent)]
    Control(#[from] ControlError),

    #[error("{failed} of {total} connections failed")]
    Connections { failed: usize, total: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map the error to a process exit code (sysexits.h where one fits).
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) => 78,    // EX_CONFIG
            Self::Io(_) => 74,        // EX_IOERR
            Self::HostSetup(_) => 71, // EX_OSERR
            Self::Control(_) => 69,   // EX_UNAVAILABLE
            Self::Startup(_)
            | Self::ProcessExited(_)
            | Self::Health(_)
            | Self::Connections { .. } => 1,
        }
    }
}

impl From<SupervisorError> for CliError {
    fn from(err: SupervisorError) -> Self {
        match err {
            SupervisorError::Config(e) => Self::Config(e),
            SupervisorError::ProcessExited { .. } => Self::ProcessExited(err),
            other => Self::Startup(other),
        }
    }
}

/// Exit code for an error returned by a handler.
pub fn exit_code(err: &anyhow::Error) -> u8 {
    err.downcast_ref::<CliError>()
        .map_or(1, CliError::exit_code)
}

#[cfg(test)]
mod tests {
    use anyhow::Context;
    use tailswan_runtime::Service;

    use super::*;

    #[test]
    fn test_process_exit_maps_to_one() {
        let err = CliError::from(SupervisorError::ProcessExited {
            service: Service::MeshDaemon,
            reason: "exit status: 1".to_string(),
        });
        assert!(matches!(err, CliError::ProcessExited(_)));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_config_error_unwrapped() {
        let err = CliError::from(SupervisorError::Config(ConfigError::InvalidPort));
        assert!(matches!(err, CliError::Config(ConfigError::InvalidPort)));
        assert_eq!(err.exit_code(), 78);
    }

    #[test]
    fn test_exit_code_survives_context() {
        let err: anyhow::Error = Err::<(), _>(CliError::Control(ControlError::Unavailable("mesh")))
            .context("Failed to query mesh")
            .unwrap_err();
        assert_eq!(exit_code(&err), 69);
        assert_eq!(exit_code(&anyhow::anyhow!("other")), 1);
    }
}
