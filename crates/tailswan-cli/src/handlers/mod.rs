//! Subcommand handlers.
//!
//! Each handler is thin: it builds the adapters it needs from [`Settings`]
//! and delegates to the runtime.
//!
//! [`Settings`]: crate::config::Settings

pub mod health;
pub mod query;
pub mod run;
pub mod tunnels;

use tailswan_runtime::{SwanctlControl, TailscaleCli};

use crate::config::Settings;

fn mesh_client(settings: &Settings) -> TailscaleCli {
    TailscaleCli::new(settings.socket.clone())
}

fn swanctl() -> SwanctlControl {
    SwanctlControl::default()
}
