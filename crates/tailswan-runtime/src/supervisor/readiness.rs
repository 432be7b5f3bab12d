//! Readiness polling for the mesh daemon.

use std::time::Duration;

use tailswan_core::{MeshControl, MeshStatus};
use thiserror::Error;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Attempts between progress logs while waiting.
const LOG_EVERY: u32 = 10;

#[derive(Debug, Error)]
pub enum ReadinessError {
    #[error("not ready after {attempts} attempts in {elapsed:?}: {last_error}")]
    TimedOut {
        attempts: u32,
        elapsed: Duration,
        last_error: String,
    },

    #[error("cancelled while waiting for readiness")]
    Cancelled,
}

/// Poll [`MeshControl::status`] until it succeeds.
///
/// The first probe is immediate; later probes are `poll_interval` apart. Gives
/// up after `timeout` or when `ctx` is cancelled.
pub async fn wait_for_mesh_ready(
    mesh: &dyn MeshControl,
    timeout: Duration,
    poll_interval: Duration,
    ctx: &CancellationToken,
) -> Result<MeshStatus, ReadinessError> {
    info!(timeout_secs = timeout.as_secs(), "Waiting for mesh daemon");
    let started = Instant::now();
    let deadline = started + timeout;
    let mut attempts: u32 = 0;

    loop {
        attempts += 1;
        let probe = tokio::select! {
            biased;
            () = ctx.cancelled() => return Err(ReadinessError::Cancelled),
            result = tokio::time::timeout_at(deadline, mesh.status()) => result,
        };

        let last_error = match probe {
            Ok(Ok(status)) => {
                info!(
                    attempts,
                    backend_state = %status.backend_state,
                    "Mesh daemon is ready"
                );
                return Ok(status);
            }
            Ok(Err(e)) => e.to_string(),
            Err(_) => "status probe timed out".to_string(),
        };

        if attempts % LOG_EVERY == 0 {
            info!(attempts, "Still waiting for mesh daemon: {}", last_error);
        } else {
            debug!(attempts, "Mesh daemon not ready: {}", last_error);
        }

        if Instant::now() + poll_interval >= deadline {
            return Err(ReadinessError::TimedOut {
                attempts,
                elapsed: started.elapsed(),
                last_error,
            });
        }

        tokio::select! {
            biased;
            () = ctx.cancelled() => return Err(ReadinessError::Cancelled),
            () = sleep(poll_interval) => {}
        }
    }
}
