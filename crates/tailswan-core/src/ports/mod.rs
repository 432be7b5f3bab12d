//! Port definitions (trait abstractions) for the external control planes.
//!
//! The supervisor and the broadcaster talk to the IPsec daemon and the mesh
//! daemon only through these traits. Implementations live in
//! `tailswan-runtime`; tests substitute recording stubs.
//!
//! # Design Rules
//!
//! - Express **intent** ("initiate tunnel", "bring mesh up"), not the command
//!   line or wire protocol used to achieve it
//! - Every call may fail; failures are reported as [`ControlError`]

mod ipsec_control;
mod mesh_control;

use thiserror::Error;

pub use ipsec_control::IpsecControl;
pub use mesh_control::{MeshControl, MeshUpOptions};

/// Errors reported by control-plane ports.
#[derive(Debug, Error)]
pub enum ControlError {
    /// No client was configured for this control plane.
    #[error("{0} control plane is not available")]
    Unavailable(&'static str),

    /// The control command ran but reported failure.
    #[error("{command} failed: {message}")]
    Command { command: String, message: String },

    /// The response could not be understood.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Transport-level failure (spawn, pipe, socket).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ControlError {
    /// Convenience constructor for [`ControlError::Command`].
    pub fn command(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Command {
            command: command.into(),
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for ControlError {
    fn from(err: serde_json::Error) -> Self {
        Self::Protocol(err.to_string())
    }
}
