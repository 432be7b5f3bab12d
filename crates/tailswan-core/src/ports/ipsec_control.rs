//! IPsec control plane port.

use std::path::Path;

use async_trait::async_trait;

use super::ControlError;
use crate::domain::JsonMap;

/// Control session with the IPsec daemon.
///
/// Each listing call returns one JSON object per streamed response message,
/// keyed the way the daemon keys them (IKE SA name, connection name).
#[async_trait]
pub trait IpsecControl: Send + Sync {
    /// List all security associations.
    async fn list_sas(&self) -> Result<Vec<JsonMap>, ControlError>;

    /// List all loaded tunnel connections.
    async fn list_connections(&self) -> Result<Vec<JsonMap>, ControlError>;

    /// Initiate the named tunnel.
    async fn initiate(&self, name: &str) -> Result<(), ControlError>;

    /// Terminate the named tunnel.
    async fn terminate(&self, name: &str) -> Result<(), ControlError>;

    /// (Re)load configuration from `path`.
    async fn load_config(&self, path: &Path) -> Result<(), ControlError>;
}
