//! Running control-plane command-line tools.
//!
//! Adapters shell out to `swanctl` and `tailscale`; this module captures their
//! output and turns a non-zero exit into a [`ControlError::Command`].

use std::process::Stdio;

use tailswan_core::ControlError;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Run `program args...`, optionally feeding `stdin`, and return stdout.
pub(crate) async fn run_tool(
    program: &str,
    args: &[String],
    stdin: Option<&[u8]>,
) -> Result<String, ControlError> {
    let rendered = display_command(program, args);
    debug!(command = %rendered, "Running control command");

    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .kill_on_drop(true);

    let mut child = cmd.spawn()?;
    if let Some(input) = stdin
        && let Some(mut pipe) = child.stdin.take()
    {
        pipe.write_all(input).await?;
        // Close stdin so the tool sees EOF.
        drop(pipe);
    }

    let output = child.wait_with_output().await?;
    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    if output.status.success() {
        return Ok(stdout);
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    let message = first_non_empty(&[stderr.trim(), stdout.trim()])
        .map_or_else(|| output.status.to_string(), str::to_string);
    Err(ControlError::command(rendered, message))
}

fn first_non_empty<'a>(candidates: &[&'a str]) -> Option<&'a str> {
    candidates.iter().copied().find(|s| !s.is_empty())
}

/// Render a command line for logs, hiding secrets passed as `--authkey=`.
pub(crate) fn display_command(program: &str, args: &[String]) -> String {
    let mut rendered = String::from(program);
    for arg in args {
        rendered.push(' ');
        if arg.starts_with("--authkey=") {
            rendered.push_str("--authkey=<redacted>");
        } else {
            rendered.push_str(arg);
        }
    }
    rendered
}
