//! The `run` command: supervise the session until a signal or a process exit.

use std::sync::Arc;

use anyhow::Context;
use tailswan_axum::{bind, start_server};
use tailswan_runtime::{Supervisor, prepare_host};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::{mesh_client, swanctl};
use crate::config::Settings;
use crate::error::CliError;

pub async fn execute(settings: &Settings) -> anyhow::Result<()> {
    if settings.skip_host_setup {
        info!("Skipping host setup");
    } else {
        prepare_host()
            .await
            .map_err(CliError::from)
            .context("Failed to prepare host")?;
    }

    let config = settings.supervisor_config();
    config.validate().map_err(CliError::from)?;

    let listener = bind(settings.events_addr)
        .await
        .map_err(CliError::from)
        .with_context(|| format!("Failed to bind event feed on {}", settings.events_addr))?;

    let supervisor = Supervisor::new(config, Arc::new(swanctl()), Arc::new(mesh_client(settings)));
    let mut errors = supervisor
        .errors()
        .context("Supervisor error channel already taken")?;

    let shutdown = CancellationToken::new();
    let signals = tokio::spawn(cancel_on_signal(shutdown.clone()));

    if let Err(e) = supervisor.start(&shutdown).await {
        signals.abort();
        if shutdown.is_cancelled() {
            info!("Startup interrupted by shutdown signal");
            return Ok(());
        }
        return Err(CliError::from(e)).context("Failed to start services");
    }

    let server_token = CancellationToken::new();
    let server = tokio::spawn(start_server(
        listener,
        supervisor.broadcaster(),
        server_token.clone(),
    ));

    let outcome = tokio::select! {
        () = shutdown.cancelled() => Ok(()),
        Some(err) = errors.recv() => {
            error!("{}", err);
            Err(CliError::from(err))
        }
    };

    supervisor.stop().await;
    server_token.cancel();
    match server.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("Event feed failed: {}", e),
        Err(e) => warn!("Event feed task failed: {}", e),
    }
    signals.abort();

    outcome.map_err(Into::into)
}

async fn cancel_on_signal(token: CancellationToken) {
    match wait_for_shutdown_signal().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => warn!("Failed to listen for shutdown signals: {}", e),
    }
    token.cancel();
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result,
        _ = sigterm.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
