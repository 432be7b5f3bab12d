//! Mesh control through the `tailscale` command-line client.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tailswan_core::{ControlError, MeshControl, MeshStatus, MeshUpOptions, ServeConfig};
use tracing::{debug, info};

use crate::command::{display_command, run_tool};

/// Default `tailscale` executable.
pub const TAILSCALE: &str = "tailscale";

/// [`MeshControl`] backed by `tailscale --socket <sock> …`.
#[derive(Debug, Clone)]
pub struct TailscaleCli {
    program: String,
    socket: PathBuf,
}

impl TailscaleCli {
    pub fn new(socket: impl Into<PathBuf>) -> Self {
        Self::with_program(TAILSCALE, socket)
    }

    pub fn with_program(program: impl Into<String>, socket: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            socket: socket.into(),
        }
    }

    pub fn socket(&self) -> &Path {
        &self.socket
    }

    fn args<I, S>(&self, rest: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut args = vec![format!("--socket={}", self.socket.display())];
        args.extend(rest.into_iter().map(Into::into));
        args
    }
}

/// Arguments for `tailscale up`.
pub fn up_args(options: &MeshUpOptions) -> Vec<String> {
    let mut args = vec!["up".to_string(), format!("--hostname={}", options.hostname)];
    if let Some(key) = options.auth_key.as_deref().filter(|k| !k.is_empty()) {
        args.push(format!("--authkey={key}"));
    }
    if !options.advertise_routes.is_empty() {
        args.push(format!(
            "--advertise-routes={}",
            options.advertise_routes.join(",")
        ));
    }
    if options.ssh {
        args.push("--ssh".to_string());
    }
    args.extend(options.extra_args.iter().cloned());
    args
}

#[async_trait]
impl MeshControl for TailscaleCli {
    async fn status(&self) -> Result<MeshStatus, ControlError> {
        let output = run_tool(&self.program, &self.args(["status", "--json"]), None).await?;
        Ok(serde_json::from_str(&output)?)
    }

    async fn up(&self, options: &MeshUpOptions) -> Result<(), ControlError> {
        let args = self.args(up_args(options));
        info!(command = %display_command(&self.program, &args), "Bringing up mesh node");
        run_tool(&self.program, &args, None).await.map(drop)
    }

    async fn set_serve_config(&self, config: &ServeConfig) -> Result<(), ControlError> {
        let body = serde_json::to_vec(config)?;
        debug!(bytes = body.len(), "Applying serve configuration");
        run_tool(&self.program, &self.args(["serve", "set-raw"]), Some(&body))
            .await
            .map(drop)
    }

    async fn serve_config(&self) -> Result<Option<ServeConfig>, ControlError> {
        let output = run_tool(&self.program, &self.args(["serve", "status", "--json"]), None).await?;
        let trimmed = output.trim();
        if trimmed.is_empty() || trimmed == "{}" || trimmed == "null" {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(trimmed)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_up_args_full() {
        let options = MeshUpOptions {
            hostname: "gw".to_string(),
            auth_key: Some("tskey-abc".to_string()),
            advertise_routes: vec!["10.0.0.0/24".to_string(), "10.1.0.0/24".to_string()],
            ssh: true,
            extra_args: vec!["--accept-dns=false".to_string()],
        };
        assert_eq!(
            up_args(&options),
            [
                "up",
                "--hostname=gw",
                "--authkey=tskey-abc",
                "--advertise-routes=10.0.0.0/24,10.1.0.0/24",
                "--ssh",
                "--accept-dns=false"
            ]
        );
    }

    #[test]
    fn test_up_args_minimal() {
        let options = MeshUpOptions {
            hostname: "tailswan".to_string(),
            auth_key: Some(String::new()),
            ..MeshUpOptions::default()
        };
        assert_eq!(up_args(&options), ["up", "--hostname=tailswan"]);
    }

    #[test]
    fn test_socket_flag_comes_first() {
        let cli = TailscaleCli::new("/run/ts.sock");
        assert_eq!(
            cli.args(["status", "--json"]),
            ["--socket=/run/ts.sock", "status", "--json"]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_status_parses_json() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("tailscale");
        std::fs::write(
            &script,
            "#!/bin/sh\necho '{\"BackendState\":\"Running\",\"Peer\":null}'\n",
        )
        .unwrap();
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        }

        let cli = TailscaleCli::with_program(script.display().to_string(), "/run/ts.sock");
        let status = cli.status().await.unwrap();
        assert_eq!(status.backend_state, "Running");
        assert_eq!(status.peers().count(), 0);
    }
}
