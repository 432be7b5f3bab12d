//! Polled state topics.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One independently polled category of observable state.
///
/// Each topic has exactly one poller, its own change fingerprint and its own
/// SSE event name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    /// IKE/child security associations reported by the IPsec daemon.
    SecurityAssociations,
    /// Peers visible on the mesh network.
    Peers,
    /// Tunnel connection definitions loaded into the IPsec daemon.
    Connections,
    /// Backend state of the local mesh node.
    NodeStatus,
}

impl Topic {
    /// Every topic, in poller spawn order.
    pub const ALL: [Self; 4] = [
        Self::SecurityAssociations,
        Self::Peers,
        Self::Connections,
        Self::NodeStatus,
    ];

    /// Stable short key for the topic.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::SecurityAssociations => "sas",
            Self::Peers => "peers",
            Self::Connections => "connections",
            Self::NodeStatus => "node",
        }
    }

    /// SSE event name used when a change is broadcast.
    #[must_use]
    pub const fn event_name(self) -> &'static str {
        match self {
            Self::SecurityAssociations => "sa-update",
            Self::Peers => "peer-update",
            Self::Connections => "connection-update",
            Self::NodeStatus => "node-update",
        }
    }

    /// Default polling period.
    #[must_use]
    pub const fn default_interval(self) -> Duration {
        match self {
            Self::SecurityAssociations => Duration::from_secs(5),
            Self::Peers => Duration::from_secs(10),
            Self::Connections | Self::NodeStatus => Duration::from_secs(30),
        }
    }

    /// Dense index, used for per-topic slot arrays.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::SecurityAssociations => 0,
            Self::Peers => 1,
            Self::Connections => 2,
            Self::NodeStatus => 3,
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Returned when a topic name does not match any known topic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown topic: {0}")]
pub struct UnknownTopic(pub String);

impl FromStr for Topic {
    type Err = UnknownTopic;

    /// Accepts either the short key (`sas`) or the event name (`sa-update`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|topic| topic.key() == s || topic.event_name() == s)
            .ok_or_else(|| UnknownTopic(s.to_string()))
    }
}
