//! Mesh daemon status and serve configuration.
//!
//! These mirror the JSON documents exchanged with `tailscaled`. Only the
//! fields the supervisor and the broadcaster consume are modelled; unknown
//! fields are ignored on input.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

/// Status document reported by the mesh daemon (`status --json`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeshStatus {
    /// Backend state, e.g. `Running`, `NeedsLogin`, `Stopped`.
    #[serde(rename = "BackendState", default)]
    pub backend_state: String,
    /// The local node.
    #[serde(rename = "Self", default)]
    pub self_node: Option<PeerStatus>,
    /// Remote peers keyed by node key. The daemon emits `null` when empty.
    #[serde(rename = "Peer", default)]
    pub peers: Option<HashMap<String, PeerStatus>>,
}

impl MeshStatus {
    /// Iterate over peers, treating a missing map as empty.
    pub fn peers(&self) -> impl Iterator<Item = &PeerStatus> {
        self.peers.iter().flat_map(HashMap::values)
    }
}

/// One node as reported by the mesh daemon.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PeerStatus {
    #[serde(rename = "ID", default)]
    pub id: String,
    #[serde(default)]
    pub host_name: String,
    #[serde(rename = "DNSName", default)]
    pub dns_name: String,
    #[serde(rename = "OS", default)]
    pub os: String,
    #[serde(default)]
    pub online: bool,
    #[serde(rename = "TailscaleIPs", default)]
    pub tailscale_ips: Option<Vec<String>>,
    #[serde(default)]
    pub last_seen: Option<String>,
}

/// Serve (reverse proxy) configuration applied through the mesh daemon.
///
/// Ordered maps keep the serialized form stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServeConfig {
    #[serde(rename = "TCP", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tcp: BTreeMap<u16, TcpPortHandler>,
    #[serde(rename = "Web", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub web: BTreeMap<String, WebServerConfig>,
}

/// Listener behaviour for one public TCP port.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TcpPortHandler {
    #[serde(rename = "HTTPS", default, skip_serializing_if = "is_false")]
    pub https: bool,
    #[serde(rename = "HTTP", default, skip_serializing_if = "is_false")]
    pub http: bool,
}

/// Path handlers for one `host:port`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebServerConfig {
    #[serde(rename = "Handlers", default)]
    pub handlers: BTreeMap<String, HttpHandler>,
}

/// Handler for one mount point.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpHandler {
    #[serde(rename = "Proxy", default, skip_serializing_if = "String::is_empty")]
    pub proxy: String,
}

/// Host placeholder the mesh daemon expands to the node's certificate domain.
pub const CERT_DOMAIN_PLACEHOLDER: &str = "${TS_CERT_DOMAIN}";

#[allow(clippy::trivially_copy_pass_by_ref)] // serde's skip_serializing_if passes by reference
const fn is_false(value: &bool) -> bool {
    !*value
}

impl ServeConfig {
    /// Expose a local HTTP server on the node's HTTPS (443) and HTTP (80) ports.
    #[must_use]
    pub fn reverse_proxy(local_port: u16) -> Self {
        let target = format!("http://127.0.0.1:{local_port}");

        let mut tcp = BTreeMap::new();
        tcp.insert(
            443,
            TcpPortHandler {
                https: true,
                http: false,
            },
        );
        tcp.insert(
            80,
            TcpPortHandler {
                https: false,
                http: true,
            },
        );

        let web = [443, 80]
            .into_iter()
            .map(|port| {
                let mut handlers = BTreeMap::new();
                handlers.insert(
                    "/".to_string(),
                    HttpHandler {
                        proxy: target.clone(),
                    },
                );
                (
                    format!("{CERT_DOMAIN_PLACEHOLDER}:{port}"),
                    WebServerConfig { handlers },
                )
            })
            .collect();

        Self { tcp, web }
    }

    /// Proxy target mounted at `/` for the given host-port key, if any.
    #[must_use]
    pub fn root_proxy(&self, host_port: &str) -> Option<&str> {
        self.web
            .get(host_port)
            .and_then(|web| web.handlers.get("/"))
            .map(|handler| handler.proxy.as_str())
    }
}
