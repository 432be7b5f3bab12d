//! Commands acting on IPsec connections.

use anyhow::Context;
use tailswan_core::{ControlError, IpsecControl};
use tracing::{error, info};

use super::swanctl;
use crate::config::Settings;
use crate::error::CliError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TunnelAction {
    Initiate,
    Terminate,
}

impl TunnelAction {
    const fn verb(self) -> &'static str {
        match self {
            Self::Initiate => "initiate",
            Self::Terminate => "terminate",
        }
    }
}

/// `start` / `stop`: apply `action` to each connection in turn.
pub async fn execute(action: TunnelAction, connections: &[String]) -> anyhow::Result<()> {
    apply(&swanctl(), action, connections).await?;
    Ok(())
}

/// A failure on one connection does not prevent the next.
pub async fn apply(
    ipsec: &dyn IpsecControl,
    action: TunnelAction,
    connections: &[String],
) -> Result<(), CliError> {
    let mut failed = 0;
    for name in connections {
        let result: Result<(), ControlError> = match action {
            TunnelAction::Initiate => ipsec.initiate(name).await,
            TunnelAction::Terminate => ipsec.terminate(name).await,
        };
        match result {
            Ok(()) => info!(connection = %name, "Connection {}d", action.verb()),
            Err(e) => {
                error!(connection = %name, "Failed to {} connection: {}", action.verb(), e);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        return Err(CliError::Connections {
            failed,
            total: connections.len(),
        });
    }
    Ok(())
}

/// `reload`
pub async fn reload(settings: &Settings) -> anyhow::Result<()> {
    swanctl()
        .load_config(&settings.swan_config)
        .await
        .map_err(CliError::from)
        .with_context(|| format!("Failed to load {}", settings.swan_config.display()))?;
    info!(path = %settings.swan_config.display(), "Configuration reloaded");
    Ok(())
}
