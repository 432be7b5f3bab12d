//! Host-level concerns outside the supervised session: preparing the kernel
//! and firewall before startup, and the container health check.

mod health;
mod host;

pub use health::{CHARON, HealthError, check_health};
pub use host::{
    HostSetupError, HostTools, MESH_INTERFACE, SYSCTL_SETTINGS, prepare_host, prepare_host_with,
};
