//! Container health check.

use tailswan_core::{ControlError, MeshControl};
use thiserror::Error;
use tracing::debug;

use crate::command::run_tool;
use crate::swan::SwanctlControl;

/// Name of the IPsec daemon process.
pub const CHARON: &str = "charon";

#[derive(Debug, Error)]
pub enum HealthError {
    #[error("mesh daemon not responding: {0}")]
    Mesh(#[source] ControlError),

    #[error("swanctl not responding: {0}")]
    Swanctl(#[source] ControlError),

    #[error("charon process not found: {0}")]
    Charon(#[source] ControlError),
}

/// Check that the mesh daemon answers, `swanctl` works and `charon` runs.
///
/// Stops at the first failing check.
pub async fn check_health(
    mesh: &dyn MeshControl,
    swanctl: &SwanctlControl,
) -> Result<(), HealthError> {
    let status = mesh.status().await.map_err(HealthError::Mesh)?;
    debug!(backend_state = %status.backend_state, "Mesh daemon responded");

    let version = swanctl.version().await.map_err(HealthError::Swanctl)?;
    debug!(version = %version, "swanctl responded");

    run_tool("pgrep", &["-x".to_string(), CHARON.to_string()], None)
        .await
        .map_err(HealthError::Charon)?;
    Ok(())
}
