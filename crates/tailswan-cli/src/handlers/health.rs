//! The `healthcheck` command.

use tailswan_runtime::check_health;

use super::{mesh_client, swanctl};
use crate::config::Settings;
use crate::error::CliError;

pub async fn execute(settings: &Settings) -> anyhow::Result<()> {
    check_health(&mesh_client(settings), &swanctl())
        .await
        .map_err(CliError::from)?;
    println!("healthy");
    Ok(())
}
