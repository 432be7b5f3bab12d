//! Domain types shared by the supervisor, the broadcaster and the adapters.

mod mesh;
mod snapshot;
mod topic;

pub use mesh::{
    CERT_DOMAIN_PLACEHOLDER, HttpHandler, MeshStatus, PeerStatus, ServeConfig, TcpPortHandler,
    WebServerConfig,
};
pub use snapshot::{
    ConnectionSnapshot, JsonMap, NodeSnapshot, NodeStatus, PeerSnapshot, PeerSummary, SaSnapshot,
};
pub use topic::{Topic, UnknownTopic};
