//! Core domain types and port definitions for tailswan.
//!
//! This crate holds everything the supervisor and the event broadcaster agree
//! on without touching processes or sockets:
//!
//! - [`domain`] - topics, snapshots, mesh status and serve configuration
//! - [`events`] - the outbound [`Message`] fanned out to subscribers
//! - [`config`] - the immutable [`SupervisorConfig`]
//! - [`ports`] - trait abstractions over the IPsec and mesh control planes

#![deny(unused_crate_dependencies)]

pub mod config;
pub mod domain;
pub mod events;
pub mod ports;

pub use config::{
    ConfigError, IpsecConfig, MeshConfig, ProcessCommand, ServiceCommands, SupervisorConfig,
    SupervisorTimings,
};
pub use domain::{
    ConnectionSnapshot, JsonMap, MeshStatus, NodeSnapshot, NodeStatus, PeerSnapshot, PeerStatus,
    PeerSummary, SaSnapshot, ServeConfig, Topic, UnknownTopic,
};
pub use events::Message;
pub use ports::{ControlError, IpsecControl, MeshControl, MeshUpOptions};
