//! tailswan binary entry point.
//!
//! This is the composition root: every adapter is constructed here (through
//! the handlers) and nothing below it reads the environment or installs
//! global state.

use std::process::ExitCode;

use clap::Parser;
use tailswan_cli::handlers::{health, query, run, tunnels};
use tailswan_cli::{Cli, Commands, LogLevel};
use tracing::error;
use tracing_subscriber::EnvFilter;

fn init_tracing(level: LogLevel) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load environment variables before clap reads them
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.settings.log_level);

    let settings = &cli.settings;
    let result = match cli.selected_command() {
        Commands::Run => run::execute(settings).await,
        Commands::Healthcheck => health::execute(settings).await,
        Commands::Status => query::status(settings).await,
        Commands::Connections => query::connections().await,
        Commands::Sas => query::sas().await,
        Commands::Start { connections } => {
            tunnels::execute(tunnels::TunnelAction::Initiate, &connections).await
        }
        Commands::Stop { connections } => {
            tunnels::execute(tunnels::TunnelAction::Terminate, &connections).await
        }
        Commands::Reload => tunnels::reload(settings).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(tailswan_cli::error::exit_code(&e))
        }
    }
}
