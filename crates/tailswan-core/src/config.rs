//! Supervisor configuration.
//!
//! [`SupervisorConfig`] is an immutable value built once at the composition
//! root (from flags and environment) and read by the supervisor for the
//! whole session. These are pure domain types with no parsing concerns.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default port of the control server.
pub const DEFAULT_CONTROL_PORT: u16 = 8080;

/// Default mesh daemon state directory.
pub const DEFAULT_MESH_STATE_DIR: &str = "/var/lib/tailscale";

/// Default mesh daemon control socket.
pub const DEFAULT_MESH_SOCKET: &str = "/var/run/tailscale/tailscaled.sock";

/// Default mesh hostname.
pub const DEFAULT_MESH_HOSTNAME: &str = "tailswan";

/// Default swanctl configuration file.
pub const DEFAULT_IPSEC_CONFIG: &str = "/etc/swanctl/swanctl.conf";

/// Configuration validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("control port must be non-zero")]
    InvalidPort,

    #[error("no program configured for {0}")]
    EmptyProgram(&'static str),

    #[error("mesh hostname must not be empty")]
    EmptyHostname,
}

/// A program and its argument vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl ProcessCommand {
    /// Create a command from a program and arguments.
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

/// Commands used to launch each managed service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceCommands {
    pub ipsec: ProcessCommand,
    pub control_server: ProcessCommand,
    pub mesh_daemon: ProcessCommand,
}

impl ServiceCommands {
    /// Standard commands for a mesh daemon using `mesh`'s state and socket.
    #[must_use]
    pub fn standard(mesh: &MeshConfig) -> Self {
        Self {
            ipsec: ProcessCommand::new("ipsec", ["start", "--nofork"]),
            control_server: ProcessCommand::new("controlserver", Vec::<String>::new()),
            mesh_daemon: ProcessCommand::new(
                "tailscaled",
                [
                    "--state".to_string(),
                    mesh.state_dir.join("tailscaled.state").display().to_string(),
                    "--socket".to_string(),
                    mesh.socket.display().to_string(),
                    "--tun".to_string(),
                    "userspace-networking".to_string(),
                ],
            ),
        }
    }
}

/// Mesh-networking settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeshConfig {
    pub state_dir: PathBuf,
    pub socket: PathBuf,
    pub hostname: String,
    pub auth_key: Option<String>,
    /// Subnet routes to advertise.
    pub routes: Vec<String>,
    pub ssh: bool,
    pub extra_args: Vec<String>,
    /// Networking runs inside the control server; no separate daemon is managed.
    pub embedded: bool,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            state_dir: PathBuf::from(DEFAULT_MESH_STATE_DIR),
            socket: PathBuf::from(DEFAULT_MESH_SOCKET),
            hostname: DEFAULT_MESH_HOSTNAME.to_string(),
            auth_key: None,
            routes: Vec::new(),
            ssh: false,
            extra_args: Vec::new(),
            embedded: false,
        }
    }
}

/// IPsec settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpsecConfig {
    pub config_path: PathBuf,
    /// Initiate `connections` during startup.
    pub auto_start: bool,
    pub connections: Vec<String>,
}

impl Default for IpsecConfig {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from(DEFAULT_IPSEC_CONFIG),
            auto_start: false,
            connections: Vec::new(),
        }
    }
}

impl IpsecConfig {
    /// Tunnel names to initiate at startup; empty unless auto-start is on.
    #[must_use]
    pub fn auto_start_connections(&self) -> &[String] {
        if self.auto_start {
            &self.connections
        } else {
            &[]
        }
    }
}

/// Delays and bounds used during startup and shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupervisorTimings {
    /// Pause after starting the IPsec daemon before talking to it.
    pub settle_delay: Duration,
    /// Upper bound on waiting for the mesh daemon to answer.
    pub readiness_timeout: Duration,
    pub readiness_poll_interval: Duration,
    /// Time each process gets to exit after SIGTERM before SIGKILL.
    pub stop_grace: Duration,
}

impl Default for SupervisorTimings {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_secs(2),
            readiness_timeout: Duration::from_secs(60),
            readiness_poll_interval: Duration::from_secs(1),
            stop_grace: Duration::from_secs(2),
        }
    }
}

/// Complete supervisor configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupervisorConfig {
    pub control_port: u16,
    pub mesh: MeshConfig,
    pub ipsec: IpsecConfig,
    pub commands: ServiceCommands,
    pub timings: SupervisorTimings,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        let mesh = MeshConfig::default();
        Self {
            control_port: DEFAULT_CONTROL_PORT,
            commands: ServiceCommands::standard(&mesh),
            mesh,
            ipsec: IpsecConfig::default(),
            timings: SupervisorTimings::default(),
        }
    }
}

impl SupervisorConfig {
    /// Build a configuration whose service commands follow `mesh`.
    #[must_use]
    pub fn new(control_port: u16, mesh: MeshConfig, ipsec: IpsecConfig) -> Self {
        Self {
            control_port,
            commands: ServiceCommands::standard(&mesh),
            mesh,
            ipsec,
            timings: SupervisorTimings::default(),
        }
    }

    /// Replace the service commands.
    #[must_use]
    pub fn with_commands(mut self, commands: ServiceCommands) -> Self {
        self.commands = commands;
        self
    }

    /// Replace the timings.
    #[must_use]
    pub const fn with_timings(mut self, timings: SupervisorTimings) -> Self {
        self.timings = timings;
        self
    }

    /// Local URL of the control server.
    #[must_use]
    pub fn control_url(&self) -> String {
        format!("http://localhost:{}", self.control_port)
    }

    /// Check the configuration for values that would fail at startup.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.control_port == 0 {
            return Err(ConfigError::InvalidPort);
        }
        if self.commands.ipsec.program.trim().is_empty() {
            return Err(ConfigError::EmptyProgram("ipsec"));
        }
        if self.commands.control_server.program.trim().is_empty() {
            return Err(ConfigError::EmptyProgram("control server"));
        }
        if !self.mesh.embedded {
            if self.commands.mesh_daemon.program.trim().is_empty() {
                return Err(ConfigError::EmptyProgram("mesh daemon"));
            }
            if self.mesh.hostname.trim().is_empty() {
                return Err(ConfigError::EmptyHostname);
            }
        }
        Ok(())
    }
}
