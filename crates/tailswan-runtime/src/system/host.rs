//! Kernel and firewall settings needed to route between the tunnels.

use tailswan_core::ControlError;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::command::run_tool;

/// Kernel parameters applied with `sysctl -w`.
pub const SYSCTL_SETTINGS: [(&str, &str); 4] = [
    ("net.ipv4.ip_forward", "1"),
    ("net.ipv6.conf.all.forwarding", "1"),
    ("net.ipv4.conf.all.send_redirects", "0"),
    ("net.ipv4.conf.default.send_redirects", "0"),
];

/// Interface whose egress traffic is masqueraded.
pub const MESH_INTERFACE: &str = "tailscale0";

#[derive(Debug, Error)]
pub enum HostSetupError {
    #[error("Failed to set {key}: {source}")]
    Sysctl {
        key: &'static str,
        #[source]
        source: ControlError,
    },
}

/// Programs used for host preparation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostTools {
    pub sysctl: String,
    pub nat: Vec<String>,
}

impl Default for HostTools {
    fn default() -> Self {
        Self {
            sysctl: "sysctl".to_string(),
            nat: vec!["iptables".to_string(), "ip6tables".to_string()],
        }
    }
}

/// Enable forwarding and masquerade traffic leaving the mesh interface.
///
/// Sysctl failures are fatal. NAT rules are best-effort: the firewall tools
/// may be missing in minimal images.
pub async fn prepare_host() -> Result<(), HostSetupError> {
    prepare_host_with(&HostTools::default()).await
}

pub async fn prepare_host_with(tools: &HostTools) -> Result<(), HostSetupError> {
    info!("Enabling IP forwarding");
    for (key, value) in SYSCTL_SETTINGS {
        let args = vec!["-w".to_string(), format!("{key}={value}")];
        run_tool(&tools.sysctl, &args, None)
            .await
            .map_err(|source| HostSetupError::Sysctl { key, source })?;
        debug!(key, value, "Applied sysctl");
    }

    info!(interface = MESH_INTERFACE, "Setting up NAT rules");
    for program in &tools.nat {
        let args: Vec<String> = [
            "-t",
            "nat",
            "-A",
            "POSTROUTING",
            "-o",
            MESH_INTERFACE,
            "-j",
            "MASQUERADE",
        ]
        .iter()
        .map(ToString::to_string)
        .collect();
        if let Err(e) = run_tool(program, &args, None).await {
            warn!(tool = %program, "Failed to add NAT rule: {}", e);
        }
    }
    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_nat_failures_are_not_fatal() {
        let tools = HostTools {
            sysctl: "true".to_string(),
            nat: vec!["false".to_string(), "/nonexistent/iptables".to_string()],
        };
        assert!(prepare_host_with(&tools).await.is_ok());
    }

    #[tokio::test]
    async fn test_sysctl_failure_is_fatal() {
        let tools = HostTools {
            sysctl: "false".to_string(),
            nat: Vec::new(),
        };
        let err = prepare_host_with(&tools).await.unwrap_err();
        let HostSetupError::Sysctl { key, .. } = err;
        assert_eq!(key, "net.ipv4.ip_forward");
    }
}
