//! Per-topic snapshots.
//!
//! A snapshot is the full current state of one topic. The broadcaster
//! serializes it as the payload of a change message, so field names here are
//! part of the UI-facing contract.

use serde::{Deserialize, Serialize};

use super::mesh::{MeshStatus, PeerStatus};

/// Free-form JSON object, as produced by the IPsec control plane.
pub type JsonMap = serde_json::Map<String, serde_json::Value>;

/// Current security associations, one map per IKE SA.
///
/// Snapshots are only built from a successful fetch, so `success` is always
/// `true`; clients drop messages without it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaSnapshot {
    pub success: bool,
    pub sas: Vec<JsonMap>,
}

impl SaSnapshot {
    pub const fn new(sas: Vec<JsonMap>) -> Self {
        Self { success: true, sas }
    }
}

/// Loaded tunnel connection definitions, one map per connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionSnapshot {
    pub success: bool,
    pub connections: Vec<JsonMap>,
}

impl ConnectionSnapshot {
    pub const fn new(connections: Vec<JsonMap>) -> Self {
        Self {
            success: true,
            connections,
        }
    }
}

/// UI-facing view of one mesh peer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerSummary {
    pub id: String,
    pub hostname: String,
    pub dns_name: String,
    pub online: bool,
    pub tailscale_ips: Vec<String>,
    pub os: String,
    pub last_seen: Option<String>,
}

impl From<&PeerStatus> for PeerSummary {
    fn from(peer: &PeerStatus) -> Self {
        Self {
            id: peer.id.clone(),
            hostname: peer.host_name.clone(),
            dns_name: peer.dns_name.clone(),
            online: peer.online,
            tailscale_ips: peer.tailscale_ips.clone().unwrap_or_default(),
            os: peer.os.clone(),
            last_seen: peer.last_seen.clone(),
        }
    }
}

/// Mesh peers plus the local node.
///
/// The local node keeps the daemon's own field names (`HostName`,
/// `TailscaleIPs`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerSnapshot {
    pub success: bool,
    /// Sorted by id; the daemon reports peers as an unordered map.
    pub peers: Vec<PeerSummary>,
    #[serde(rename = "self")]
    pub self_node: Option<PeerStatus>,
}

impl From<&MeshStatus> for PeerSnapshot {
    fn from(status: &MeshStatus) -> Self {
        let mut peers: Vec<PeerSummary> = status.peers().map(PeerSummary::from).collect();
        peers.sort_by(|a, b| a.id.cmp(&b.id));
        Self {
            success: true,
            peers,
            self_node: status.self_node.clone(),
        }
    }
}

/// Backend state and local node, in the daemon's field names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStatus {
    #[serde(rename = "BackendState")]
    pub backend_state: String,
    #[serde(rename = "Self")]
    pub self_node: Option<PeerStatus>,
}

/// Status of the local mesh node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub success: bool,
    pub status: NodeStatus,
}

impl From<&MeshStatus> for NodeSnapshot {
    fn from(status: &MeshStatus) -> Self {
        Self {
            success: true,
            status: NodeStatus {
                backend_state: status.backend_state.clone(),
                self_node: status.self_node.clone(),
            },
        }
    }
}
