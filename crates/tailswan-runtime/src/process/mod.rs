//! Process lifecycle for the supervised services.
//!
//! - [`ManagedProcess`] - one spawned process with start/stop/wait/liveness
//! - `signal` - PID signalling helpers used by the handle

mod managed;
mod signal;

use thiserror::Error;

pub use managed::{ExitRecord, ManagedProcess, ProcessState};

/// Errors from process lifecycle operations.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("{label} is already running (pid {pid})")]
    AlreadyRunning { label: String, pid: u32 },

    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{label} exited: {status}")]
    Exited { label: String, status: String },

    #[error("Failed waiting on {label}: {reason}")]
    WaitFailed { label: String, reason: String },

    #[error("Failed to signal {label}: {reason}")]
    Signal { label: String, reason: String },
}
