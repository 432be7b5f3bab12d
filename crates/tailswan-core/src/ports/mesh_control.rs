//! Mesh-networking control plane port.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::ControlError;
use crate::config::MeshConfig;
use crate::domain::{MeshStatus, ServeConfig};

/// Options for bringing the mesh node up.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeshUpOptions {
    pub hostname: String,
    pub auth_key: Option<String>,
    pub advertise_routes: Vec<String>,
    pub ssh: bool,
    pub extra_args: Vec<String>,
}

impl From<&MeshConfig> for MeshUpOptions {
    fn from(config: &MeshConfig) -> Self {
        Self {
            hostname: config.hostname.clone(),
            auth_key: config.auth_key.clone(),
            advertise_routes: config.routes.clone(),
            ssh: config.ssh,
            extra_args: config.extra_args.clone(),
        }
    }
}

/// Status and configuration client for the mesh daemon.
#[async_trait]
pub trait MeshControl: Send + Sync {
    /// Current status: self, peers and backend state.
    ///
    /// A successful call also serves as the daemon's readiness probe.
    async fn status(&self) -> Result<MeshStatus, ControlError>;

    /// Bring the node up with the given identity, key, routes and flags.
    async fn up(&self, options: &MeshUpOptions) -> Result<(), ControlError>;

    /// Replace the serve (reverse proxy) configuration.
    async fn set_serve_config(&self, config: &ServeConfig) -> Result<(), ControlError>;

    /// Read the current serve configuration, `None` if nothing is served.
    async fn serve_config(&self) -> Result<Option<ServeConfig>, ControlError>;
}
