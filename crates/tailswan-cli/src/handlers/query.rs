//! Read-only commands printing the same snapshots the event feed carries.

use anyhow::Context;
use serde_json::Value;
use tailswan_core::{
    ConnectionSnapshot, IpsecControl, MeshControl, NodeSnapshot, PeerSnapshot, SaSnapshot,
};

use super::{mesh_client, swanctl};
use crate::config::Settings;
use crate::error::CliError;

/// `status`: backend state plus peers.
pub async fn status(settings: &Settings) -> anyhow::Result<()> {
    let status = mesh_client(settings)
        .status()
        .await
        .map_err(CliError::from)
        .context("Failed to query mesh status")?;

    let node = NodeSnapshot::from(&status);
    let peers = PeerSnapshot::from(&status);
    print_json(&serde_json::json!({
        "BackendState": node.status.backend_state,
        "Self": node.status.self_node,
        "peers": peers.peers,
    }))
}

/// `connections`
pub async fn connections() -> anyhow::Result<()> {
    let connections = swanctl()
        .list_connections()
        .await
        .map_err(CliError::from)
        .context("Failed to list connections")?;
    print_json(&serde_json::to_value(ConnectionSnapshot::new(connections))?)
}

/// `sas`
pub async fn sas() -> anyhow::Result<()> {
    let sas = swanctl()
        .list_sas()
        .await
        .map_err(CliError::from)
        .context("Failed to list security associations")?;
    print_json(&serde_json::to_value(SaSnapshot::new(sas))?)
}

fn print_json(value: &Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
