//! Settings shared by every subcommand.
//!
//! Each setting has a long flag and an environment variable named after the
//! container's runtime environment. [`Settings::supervisor_config`] turns the
//! parsed values into the immutable [`SupervisorConfig`].

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;

use clap::builder::FalseyValueParser;
use clap::{Args, ValueEnum};
use tailswan_core::config::{
    DEFAULT_CONTROL_PORT, DEFAULT_IPSEC_CONFIG, DEFAULT_MESH_HOSTNAME, DEFAULT_MESH_SOCKET,
    DEFAULT_MESH_STATE_DIR,
};
use tailswan_core::{IpsecConfig, MeshConfig, SupervisorConfig};

/// Default listen address of the local event feed.
pub const DEFAULT_EVENTS_ADDR: &str = "127.0.0.1:8081";

/// Log verbosity used when `RUST_LOG` is unset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Args)]
pub struct Settings {
    /// Port of the control server
    #[arg(long, env = "CONTROL_PORT", default_value_t = DEFAULT_CONTROL_PORT, global = true)]
    pub control_port: u16,

    /// Log level used when RUST_LOG is not set
    #[arg(long, env = "LOG_LEVEL", value_enum, default_value_t = LogLevel::Info, global = true)]
    pub log_level: LogLevel,

    /// Mesh daemon state directory
    #[arg(long = "ts-state-dir", env = "TS_STATE_DIR", default_value = DEFAULT_MESH_STATE_DIR, global = true)]
    pub state_dir: PathBuf,

    /// Mesh daemon control socket
    #[arg(long = "ts-socket", env = "TS_SOCKET", default_value = DEFAULT_MESH_SOCKET, global = true)]
    pub socket: PathBuf,

    /// Hostname announced on the mesh
    #[arg(long = "ts-hostname", env = "TS_HOSTNAME", default_value = DEFAULT_MESH_HOSTNAME, global = true)]
    pub hostname: String,

    /// Auth key used to join the mesh
    #[arg(long = "ts-authkey", env = "TS_AUTHKEY", hide_env_values = true, global = true)]
    pub auth_key: Option<String>,

    /// Comma-separated subnet routes to advertise
    #[arg(long = "ts-routes", env = "TS_ROUTES", global = true)]
    pub routes: Option<String>,

    /// Enable SSH over the mesh
    #[arg(long = "ts-ssh", env = "TS_SSH", value_parser = FalseyValueParser::new(), global = true)]
    pub ssh: bool,

    /// Extra arguments for `tailscale up`, split on whitespace
    #[arg(long = "ts-extra-args", env = "TS_EXTRA_ARGS", allow_hyphen_values = true, global = true)]
    pub extra_args: Option<String>,

    /// Mesh networking runs inside the control server
    #[arg(long = "use-tsnet", env = "USE_TSNET", value_parser = FalseyValueParser::new(), global = true)]
    pub embedded: bool,

    /// swanctl configuration file
    #[arg(long = "swan-config", env = "SWAN_CONFIG", default_value = DEFAULT_IPSEC_CONFIG, global = true)]
    pub swan_config: PathBuf,

    /// Initiate the configured connections at startup
    #[arg(long = "swan-auto-start", env = "SWAN_AUTO_START", value_parser = FalseyValueParser::new(), global = true)]
    pub auto_start: bool,

    /// Comma-separated connections to initiate at startup
    #[arg(long = "swan-connections", env = "SWAN_CONNECTIONS", global = true)]
    pub connections: Option<String>,

    /// Listen address of the local event feed
    #[arg(long = "events-addr", env = "EVENTS_ADDR", default_value = DEFAULT_EVENTS_ADDR, global = true)]
    pub events_addr: SocketAddr,

    /// Skip sysctl and NAT setup before supervising
    #[arg(long, global = true)]
    pub skip_host_setup: bool,
}

impl Settings {
    pub fn mesh_config(&self) -> MeshConfig {
        MeshConfig {
            state_dir: self.state_dir.clone(),
            socket: self.socket.clone(),
            hostname: self.hostname.clone(),
            auth_key: self.auth_key.clone().filter(|key| !key.trim().is_empty()),
            routes: split_list(self.routes.as_deref()),
            ssh: self.ssh,
            extra_args: split_args(self.extra_args.as_deref()),
            embedded: self.embedded,
        }
    }

    pub fn ipsec_config(&self) -> IpsecConfig {
        IpsecConfig {
            config_path: self.swan_config.clone(),
            auto_start: self.auto_start,
            connections: split_list(self.connections.as_deref()),
        }
    }

    pub fn supervisor_config(&self) -> SupervisorConfig {
        SupervisorConfig::new(self.control_port, self.mesh_config(), self.ipsec_config())
    }
}

/// Split a comma-separated list, trimming entries and dropping empty ones.
pub fn split_list(value: Option<&str>) -> Vec<String> {
    value
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(String::from)
        .collect()
}

fn split_args(value: Option<&str>) -> Vec<String> {
    value
        .unwrap_or_default()
        .split_whitespace()
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_list_trims_and_drops_empty() {
        assert_eq!(
            split_list(Some(" 10.0.0.0/24, ,192.168.1.0/24,")),
            ["10.0.0.0/24", "192.168.1.0/24"]
        );
        assert!(split_list(None).is_empty());
        assert!(split_list(Some("")).is_empty());
    }

    #[test]
    fn test_split_args_on_whitespace() {
        assert_eq!(
            split_args(Some("--accept-dns=false   --shields-up")),
            ["--accept-dns=false", "--shields-up"]
        );
        assert!(split_args(None).is_empty());
    }

    #[test]
    fn test_log_level_strings() {
        assert_eq!(LogLevel::default().as_str(), "info");
        assert_eq!(LogLevel::Warn.to_string(), "warn");
    }
}
