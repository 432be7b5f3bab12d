//! Runtime for the tailswan supervisor.
//!
//! Everything that touches processes, the clock or external tools lives here:
//!
//! - [`process`] - [`ManagedProcess`], one spawned OS process
//! - [`state_tracker`] - per-topic change detection over canonical JSON
//! - [`broadcast`] - [`EventBroadcaster`], polling and subscriber fan-out
//! - [`supervisor`] - [`Supervisor`], ordered startup, exit monitoring, shutdown
//! - [`swan`] / [`mesh`] - port implementations driving `swanctl` and `tailscale`
//! - [`system`] - host preparation and the health check

#![deny(unsafe_code)]

pub mod broadcast;
mod command;
pub mod mesh;
pub mod process;
pub mod state_tracker;
pub mod supervisor;
pub mod swan;
pub mod system;

pub use broadcast::{
    BroadcastError, BroadcasterConfig, ClientId, DEFAULT_CLIENT_CAPACITY,
    DEFAULT_HEARTBEAT_INTERVAL, DEFAULT_SEND_TIMEOUT, EventBroadcaster, Subscription,
};
pub use mesh::TailscaleCli;
pub use process::{ManagedProcess, ProcessError, ProcessState};
pub use state_tracker::{StateTracker, canonical_json};
pub use supervisor::{ReadinessError, Service, SessionState, Supervisor, SupervisorError};
pub use swan::SwanctlControl;
pub use system::{HealthError, HostSetupError, check_health, prepare_host};
