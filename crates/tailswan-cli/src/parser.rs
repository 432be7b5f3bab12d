//! Top-level argument parsing.

use clap::Parser;

use crate::commands::Commands;
use crate::config::Settings;

/// Supervisor for a strongSwan and Tailscale gateway.
#[derive(Debug, Parser)]
#[command(name = "tailswan")]
#[command(about = "Bridge IPsec tunnels onto a Tailscale mesh")]
#[command(version)]
pub struct Cli {
    #[command(flatten)]
    pub settings: Settings,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// The selected subcommand; `run` when none was given.
    pub fn selected_command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Run)
    }
}
