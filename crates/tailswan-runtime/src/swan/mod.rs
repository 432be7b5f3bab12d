//! IPsec control through the `swanctl` command-line tool.

mod raw;

use std::path::Path;

use async_trait::async_trait;
use tailswan_core::{ControlError, IpsecControl, JsonMap};
use tracing::{debug, info};

use crate::command::run_tool;

pub use raw::parse_events;

/// Default `swanctl` executable.
pub const SWANCTL: &str = "swanctl";

/// [`IpsecControl`] backed by `swanctl`.
#[derive(Debug, Clone)]
pub struct SwanctlControl {
    program: String,
}

impl Default for SwanctlControl {
    fn default() -> Self {
        Self::new(SWANCTL)
    }
}

impl SwanctlControl {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    async fn run(&self, args: &[&str]) -> Result<String, ControlError> {
        let args: Vec<String> = args.iter().map(ToString::to_string).collect();
        run_tool(&self.program, &args, None).await
    }

    async fn list(&self, flag: &str) -> Result<Vec<JsonMap>, ControlError> {
        let output = self.run(&[flag, "--raw"]).await?;
        let events = parse_events(&output)?;
        debug!(flag, count = events.len(), "Listed IPsec state");
        Ok(events)
    }

    /// First line of `swanctl --version`.
    pub async fn version(&self) -> Result<String, ControlError> {
        let output = self.run(&["--version"]).await?;
        Ok(output.lines().next().unwrap_or_default().trim().to_string())
    }
}

#[async_trait]
impl IpsecControl for SwanctlControl {
    async fn list_sas(&self) -> Result<Vec<JsonMap>, ControlError> {
        self.list("--list-sas").await
    }

    async fn list_connections(&self) -> Result<Vec<JsonMap>, ControlError> {
        self.list("--list-conns").await
    }

    async fn initiate(&self, name: &str) -> Result<(), ControlError> {
        info!(connection = %name, "Initiating connection");
        self.run(&["--initiate", "--child", name]).await.map(drop)
    }

    async fn terminate(&self, name: &str) -> Result<(), ControlError> {
        info!(connection = %name, "Terminating connection");
        self.run(&["--terminate", "--ike", name]).await.map(drop)
    }

    async fn load_config(&self, path: &Path) -> Result<(), ControlError> {
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            return Err(ControlError::command(
                "swanctl --load-all",
                format!("config not found: {}", path.display()),
            ));
        }

        info!(path = %path.display(), "Loading swanctl configuration");
        let path = path.display().to_string();
        self.run(&["--load-all", "--file", &path]).await.map(drop)
    }
}
