//! Session supervisor for the IPsec daemon, the control server and the mesh
//! daemon.
//!
//! # Lifecycle
//!
//! `Idle -> Starting -> Running -> Stopping -> Stopped`
//!
//! [`Supervisor::start`] runs every startup step in order and returns once
//! the session is running. From then on the first managed process to exit is
//! reported once on the channel returned by [`Supervisor::errors`]; nothing
//! is restarted. [`Supervisor::stop`] tears the session down and may be called
//! any number of times.

mod error;
mod readiness;

use std::fmt;
use std::sync::{Arc, PoisonError};
use std::time::Duration;

use tailswan_core::{
    IpsecControl, MeshControl, MeshUpOptions, ProcessCommand, ServeConfig, SupervisorConfig,
};
use tokio::sync::{Mutex, mpsc};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::broadcast::{BroadcasterConfig, EventBroadcaster};
use crate::process::ManagedProcess;

pub use error::SupervisorError;
pub use readiness::{ReadinessError, wait_for_mesh_ready};

/// A managed service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
    Ipsec,
    ControlServer,
    MeshDaemon,
}

impl Service {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Ipsec => "ipsec",
            Self::ControlServer => "control-server",
            Self::MeshDaemon => "mesh-daemon",
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Starting,
    Running,
    Stopping,
    Stopped,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

struct Session {
    state: SessionState,
    token: Option<CancellationToken>,
    tasks: Vec<JoinHandle<()>>,
}

/// Orchestrates one supervised session.
pub struct Supervisor {
    config: SupervisorConfig,
    ipsec_process: Arc<ManagedProcess>,
    control_server: Arc<ManagedProcess>,
    mesh_daemon: Arc<ManagedProcess>,
    ipsec: Arc<dyn IpsecControl>,
    mesh: Arc<dyn MeshControl>,
    broadcaster: Arc<EventBroadcaster>,
    session: Mutex<Session>,
    errors_tx: mpsc::Sender<SupervisorError>,
    errors_rx: std::sync::Mutex<Option<mpsc::Receiver<SupervisorError>>>,
}

impl fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Supervisor")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Supervisor {
    /// Create a supervisor with a default-tuned broadcaster over the same
    /// control planes.
    pub fn new(
        config: SupervisorConfig,
        ipsec: Arc<dyn IpsecControl>,
        mesh: Arc<dyn MeshControl>,
    ) -> Self {
        Self::with_broadcaster_config(config, ipsec, mesh, BroadcasterConfig::default())
    }

    pub fn with_broadcaster_config(
        config: SupervisorConfig,
        ipsec: Arc<dyn IpsecControl>,
        mesh: Arc<dyn MeshControl>,
        broadcaster_config: BroadcasterConfig,
    ) -> Self {
        let broadcaster = EventBroadcaster::new(broadcaster_config)
            .with_ipsec(Arc::clone(&ipsec))
            .with_mesh(Arc::clone(&mesh));
        let (errors_tx, errors_rx) = mpsc::channel(1);

        Self {
            config,
            ipsec_process: Arc::new(ManagedProcess::new(Service::Ipsec.label())),
            control_server: Arc::new(ManagedProcess::new(Service::ControlServer.label())),
            mesh_daemon: Arc::new(ManagedProcess::new(Service::MeshDaemon.label())),
            ipsec,
            mesh,
            broadcaster: Arc::new(broadcaster),
            session: Mutex::new(Session {
                state: SessionState::Idle,
                token: None,
                tasks: Vec::new(),
            }),
            errors_tx,
            errors_rx: std::sync::Mutex::new(Some(errors_rx)),
        }
    }

    pub const fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    /// The broadcaster fed by this session.
    pub fn broadcaster(&self) -> Arc<EventBroadcaster> {
        Arc::clone(&self.broadcaster)
    }

    /// The process handle for `service`.
    pub fn process(&self, service: Service) -> &Arc<ManagedProcess> {
        match service {
            Service::Ipsec => &self.ipsec_process,
            Service::ControlServer => &self.control_server,
            Service::MeshDaemon => &self.mesh_daemon,
        }
    }

    pub async fn state(&self) -> SessionState {
        self.session.lock().await.state
    }

    /// Receiver for runtime process failures. Available once.
    pub fn errors(&self) -> Option<mpsc::Receiver<SupervisorError>> {
        self.errors_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Start the session.
    ///
    /// The session token is a child of `ctx`: cancelling `ctx` aborts a
    /// startup in progress and later stops the pollers and the exit monitor.
    /// On failure every process already started is shut down and the session
    /// ends in [`SessionState::Stopped`].
    pub async fn start(&self, ctx: &CancellationToken) -> Result<(), SupervisorError> {
        let token = self.begin(ctx).await?;

        let started = match self.run_startup(&token).await {
            Ok(started) => started,
            Err(e) => {
                error!("Startup failed: {}", e);
                self.abort_startup(&token).await;
                return Err(e);
            }
        };

        if let Err(e) = self.enter_running(started, &token).await {
            self.abort_startup(&token).await;
            return Err(e);
        }
        Ok(())
    }

    async fn begin(&self, ctx: &CancellationToken) -> Result<CancellationToken, SupervisorError> {
        let mut session = self.session.lock().await;
        if session.state != SessionState::Idle {
            return Err(SupervisorError::InvalidState(session.state));
        }
        self.config.validate()?;
        if self.config.ipsec.auto_start && self.config.ipsec.connections.is_empty() {
            warn!("IPsec auto-start is enabled but no connections are configured");
        }

        let token = ctx.child_token();
        session.state = SessionState::Starting;
        session.token = Some(token.clone());
        Ok(token)
    }

    async fn run_startup(
        &self,
        token: &CancellationToken,
    ) -> Result<Vec<Service>, SupervisorError> {
        let timings = self.config.timings;
        let mut started = Vec::with_capacity(3);

        ensure_active(token)?;
        info!("Starting IPsec daemon");
        self.start_process(Service::Ipsec, &self.config.commands.ipsec)
            .await?;
        started.push(Service::Ipsec);

        pause(token, timings.settle_delay).await?;

        let config_path = &self.config.ipsec.config_path;
        match self.ipsec.load_config(config_path).await {
            Ok(()) => info!(path = %config_path.display(), "Loaded IPsec configuration"),
            Err(e) => warn!(path = %config_path.display(), "Failed to load IPsec configuration: {}", e),
        }

        for name in self.config.ipsec.auto_start_connections() {
            match self.ipsec.initiate(name).await {
                Ok(()) => info!(connection = %name, "Initiated connection"),
                Err(e) => warn!(connection = %name, "Failed to initiate connection: {}", e),
            }
        }

        ensure_active(token)?;
        info!(port = self.config.control_port, "Starting control server");
        self.start_process(Service::ControlServer, &self.config.commands.control_server)
            .await?;
        started.push(Service::ControlServer);

        if self.config.mesh.embedded {
            info!("Mesh networking is embedded in the control server");
        } else {
            ensure_active(token)?;
            self.start_process(Service::MeshDaemon, &self.config.commands.mesh_daemon)
                .await?;
            started.push(Service::MeshDaemon);

            self.bring_mesh_up(token).await?;
        }

        ensure_active(token)?;
        Ok(started)
    }

    async fn bring_mesh_up(&self, token: &CancellationToken) -> Result<(), SupervisorError> {
        let timings = self.config.timings;
        wait_for_mesh_ready(
            self.mesh.as_ref(),
            timings.readiness_timeout,
            timings.readiness_poll_interval,
            token,
        )
        .await
        .map_err(|e| match e {
            ReadinessError::Cancelled => SupervisorError::Cancelled,
            other => SupervisorError::MeshNotReady(other),
        })?;

        let options = MeshUpOptions::from(&self.config.mesh);
        info!(
            hostname = %options.hostname,
            routes = ?options.advertise_routes,
            ssh = options.ssh,
            "Bringing mesh up"
        );
        self.mesh
            .up(&options)
            .await
            .map_err(SupervisorError::MeshUp)?;

        let serve = ServeConfig::reverse_proxy(self.config.control_port);
        self.mesh
            .set_serve_config(&serve)
            .await
            .map_err(SupervisorError::ServeConfig)?;
        info!(port = self.config.control_port, "Serve configuration enabled");

        match self.mesh.serve_config().await {
            Ok(current) => debug!(?current, "Current serve configuration"),
            Err(e) => debug!("Could not read back serve configuration: {}", e),
        }
        Ok(())
    }

    async fn start_process(
        &self,
        service: Service,
        command: &ProcessCommand,
    ) -> Result<(), SupervisorError> {
        self.process(service)
            .start(command)
            .await
            .map_err(|source| SupervisorError::StartProcess { service, source })
    }

    async fn enter_running(
        &self,
        started: Vec<Service>,
        token: &CancellationToken,
    ) -> Result<(), SupervisorError> {
        let mut session = self.session.lock().await;
        if session.state != SessionState::Starting || token.is_cancelled() {
            return Err(SupervisorError::Cancelled);
        }

        let monitor = self.spawn_monitor(&started, token.clone());
        let broadcaster = tokio::spawn(
            Arc::clone(&self.broadcaster)
                .run(token.clone())
                .instrument(info_span!("broadcaster")),
        );
        session.tasks.push(monitor);
        session.tasks.push(broadcaster);
        session.state = SessionState::Running;

        info!("TailSwan is running");
        info!("  Control server: {}", self.config.control_url());
        if self.config.mesh.embedded {
            info!("  Mesh: embedded");
        } else {
            info!("  Mesh hostname: {}", self.config.mesh.hostname);
        }
        info!(
            "  Supervising: {}",
            started
                .iter()
                .map(|s| s.label())
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(())
    }

    /// Watch every started process; report the first exit.
    fn spawn_monitor(&self, started: &[Service], token: CancellationToken) -> JoinHandle<()> {
        let errors = self.errors_tx.clone();
        let mut watchers = JoinSet::new();
        for &service in started {
            let process = Arc::clone(self.process(service));
            watchers.spawn(async move { (service, process.wait().await) });
        }

        let monitor = async move {
            let first = tokio::select! {
                biased;
                () = token.cancelled() => None,
                Some(joined) = watchers.join_next() => Some(joined),
            };
            watchers.abort_all();

            let Some(joined) = first else {
                debug!("Exit monitor cancelled");
                return;
            };
            if token.is_cancelled() {
                return;
            }

            let (service, result) = match joined {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!("Exit watcher failed: {}", e);
                    return;
                }
            };
            let reason = match result {
                Ok(()) => "exited with status 0".to_string(),
                Err(e) => e.to_string(),
            };
            error!(service = %service, "Managed process exited: {}", reason);
            let _ = errors.try_send(SupervisorError::ProcessExited { service, reason });
        };

        tokio::spawn(monitor.instrument(info_span!("monitor")))
    }

    async fn abort_startup(&self, token: &CancellationToken) {
        token.cancel();
        self.broadcaster.stop().await;
        self.shutdown_processes().await;
        self.session.lock().await.state = SessionState::Stopped;
    }

    /// Stop the session and every managed process. Idempotent.
    pub async fn stop(&self) {
        let (token, tasks) = {
            let mut session = self.session.lock().await;
            if matches!(
                session.state,
                SessionState::Stopping | SessionState::Stopped
            ) {
                return;
            }
            session.state = SessionState::Stopping;
            (session.token.take(), std::mem::take(&mut session.tasks))
        };

        info!("Stopping TailSwan");
        if let Some(token) = token {
            token.cancel();
        }
        self.broadcaster.stop().await;
        self.shutdown_processes().await;

        for task in tasks {
            if let Err(e) = task.await {
                warn!("Session task failed: {}", e);
            }
        }

        self.session.lock().await.state = SessionState::Stopped;
        info!("TailSwan stopped");
    }

    async fn shutdown_processes(&self) {
        let grace = self.config.timings.stop_grace;
        let (control, mesh, ipsec) = tokio::join!(
            self.control_server.shutdown(grace),
            self.mesh_daemon.shutdown(grace),
            self.ipsec_process.shutdown(grace),
        );

        for (service, result) in [
            (Service::ControlServer, control),
            (Service::MeshDaemon, mesh),
            (Service::Ipsec, ipsec),
        ] {
            if let Err(e) = result {
                warn!(service = %service, "Failed to stop: {}", e);
            }
        }
    }
}

fn ensure_active(token: &CancellationToken) -> Result<(), SupervisorError> {
    if token.is_cancelled() {
        Err(SupervisorError::Cancelled)
    } else {
        Ok(())
    }
}

async fn pause(token: &CancellationToken, delay: Duration) -> Result<(), SupervisorError> {
    tokio::select! {
        biased;
        () = token.cancelled() => Err(SupervisorError::Cancelled),
        () = tokio::time::sleep(delay) => Ok(()),
    }
}
