//! A single supervised OS process.
//!
//! The [`ManagedProcess`] handle is shared (`Arc`) between the supervisor and
//! the exit monitor. The spawned `Child` itself is owned by a reaper task that
//! publishes the exit status through a `watch` channel; every other operation
//! works from the recorded PID.

use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tailswan_core::ProcessCommand;
use tokio::process::Command;
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};

use super::ProcessError;
use super::signal::{self, StopSignal};

/// How a process exited, as observed by the reaper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitRecord {
    /// The OS reported an exit status.
    Status(ExitStatus),
    /// Waiting on the child failed; the process is treated as gone.
    WaitFailed(String),
}

impl ExitRecord {
    /// True for a zero exit status.
    #[must_use]
    pub fn success(&self) -> bool {
        matches!(self, Self::Status(status) if status.success())
    }

    fn describe(&self) -> String {
        match self {
            Self::Status(status) => status.to_string(),
            Self::WaitFailed(reason) => format!("wait failed: {reason}"),
        }
    }
}

/// Lifecycle of a [`ManagedProcess`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    NotStarted,
    Running,
    Terminated,
}

struct Launch {
    program: String,
    pid: u32,
    started_at: DateTime<Utc>,
    exit: watch::Receiver<Option<ExitRecord>>,
}

impl Launch {
    fn exited(&self) -> bool {
        self.exit.borrow().is_some()
    }
}

/// Handle to one externally spawned process.
pub struct ManagedProcess {
    label: String,
    launch: Mutex<Option<Launch>>,
}

impl std::fmt::Debug for ManagedProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedProcess")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

impl ManagedProcess {
    /// Create a handle that has not been started.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            launch: Mutex::new(None),
        }
    }

    /// Human-readable name used in logs and errors.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Launch `command`.
    ///
    /// Fails with [`ProcessError::AlreadyRunning`] while a previous launch has
    /// not exited. The handle lock is held across the check and the spawn, so
    /// two concurrent starts cannot both succeed.
    pub async fn start(&self, command: &ProcessCommand) -> Result<(), ProcessError> {
        let mut launch = self.launch.lock().await;
        if let Some(current) = launch.as_ref()
            && !current.exited()
        {
            return Err(ProcessError::AlreadyRunning {
                label: self.label.clone(),
                pid: current.pid,
            });
        }

        let mut child = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| ProcessError::Spawn {
                program: command.program.clone(),
                source,
            })?;

        let Some(pid) = child.id() else {
            // Already reaped by the time we asked; nothing to supervise.
            let status = child.wait().await.map_err(|source| ProcessError::Spawn {
                program: command.program.clone(),
                source,
            })?;
            return Err(ProcessError::Exited {
                label: self.label.clone(),
                status: status.to_string(),
            });
        };

        let (exit_tx, exit_rx) = watch::channel(None);
        let label = self.label.clone();
        tokio::spawn(async move {
            let record = match child.wait().await {
                Ok(status) => ExitRecord::Status(status),
                Err(e) => ExitRecord::WaitFailed(e.to_string()),
            };
            debug!(process = %label, pid, status = %record.describe(), "Process exited");
            exit_tx.send_replace(Some(record));
        });

        let started_at = Utc::now();
        info!(
            process = %self.label,
            program = %command.program,
            pid,
            started_at = %started_at.to_rfc3339(),
            "Started process"
        );

        *launch = Some(Launch {
            program: command.program.clone(),
            pid,
            started_at,
            exit: exit_rx,
        });
        Ok(())
    }

    /// Wait for the process to exit.
    ///
    /// Returns immediately with `Ok` if the handle was never started.
    pub async fn wait(&self) -> Result<(), ProcessError> {
        let mut exit = match self.launch.lock().await.as_ref() {
            Some(launch) => launch.exit.clone(),
            None => return Ok(()),
        };

        let record = match exit.wait_for(Option::is_some).await {
            Ok(record) => record.clone(),
            // Reaper dropped its sender without publishing; treat as gone.
            Err(_) => None,
        };

        match record {
            Some(record) if record.success() => Ok(()),
            Some(ExitRecord::WaitFailed(reason)) => Err(ProcessError::WaitFailed {
                label: self.label.clone(),
                reason,
            }),
            Some(record) => Err(ProcessError::Exited {
                label: self.label.clone(),
                status: record.describe(),
            }),
            None => Err(ProcessError::WaitFailed {
                label: self.label.clone(),
                reason: "reaper stopped".to_string(),
            }),
        }
    }

    /// Ask the process to exit with SIGTERM. Does not wait.
    ///
    /// A no-op for handles that are not running.
    pub async fn kill(&self) -> Result<(), ProcessError> {
        self.signal(StopSignal::Terminate).await
    }

    /// Force the process to exit with SIGKILL. Does not wait.
    pub async fn force_kill(&self) -> Result<(), ProcessError> {
        self.signal(StopSignal::Kill).await
    }

    async fn signal(&self, sig: StopSignal) -> Result<(), ProcessError> {
        // Held until the signal is sent: the pid belongs to the current launch.
        let launch = self.launch.lock().await;
        let Some(pid) = launch
            .as_ref()
            .filter(|launch| !launch.exited())
            .map(|launch| launch.pid)
        else {
            debug!(process = %self.label, "Signal skipped, process not running");
            return Ok(());
        };

        match signal::send(pid, sig) {
            Ok(true) => {
                info!(process = %self.label, pid, signal = ?sig, "Signalled process");
                Ok(())
            }
            Ok(false) => {
                debug!(process = %self.label, pid, "Process already gone");
                Ok(())
            }
            Err(e) => Err(ProcessError::Signal {
                label: self.label.clone(),
                reason: e.to_string(),
            }),
        }
    }

    /// True while the process is running.
    ///
    /// False for un-started handles, after the reaper observed exit, and
    /// whenever the liveness probe fails.
    pub async fn is_running(&self) -> bool {
        self.live_pid().await.is_some_and(signal::probe)
    }

    /// Terminate gracefully, escalating to SIGKILL after `grace`.
    pub async fn shutdown(&self, grace: Duration) -> Result<(), ProcessError> {
        if self.live_pid().await.is_none() {
            return Ok(());
        }

        let terminated = self.kill().await;
        self.finish_shutdown(grace, terminated).await
    }

    /// Wait out `grace` after SIGTERM, then SIGKILL. A failed SIGTERM still
    /// gets the wait and the escalation.
    async fn finish_shutdown(
        &self,
        grace: Duration,
        terminated: Result<(), ProcessError>,
    ) -> Result<(), ProcessError> {
        if let Err(e) = terminated {
            warn!(process = %self.label, "SIGTERM failed, escalating after grace: {}", e);
        }
        match tokio::time::timeout(grace, self.wait()).await {
            Ok(result) => {
                if let Err(e) = result {
                    debug!(process = %self.label, "Exited after SIGTERM: {}", e);
                }
                Ok(())
            }
            Err(_) => {
                warn!(
                    process = %self.label,
                    grace_ms = grace.as_millis() as u64,
                    "Process did not exit in time, sending SIGKILL"
                );
                self.force_kill().await?;
                // A SIGKILLed process always reports a signal exit.
                let _ = self.wait().await;
                Ok(())
            }
        }
    }

    /// PID of the most recent launch.
    pub async fn pid(&self) -> Option<u32> {
        self.launch.lock().await.as_ref().map(|l| l.pid)
    }

    /// Start time of the most recent launch.
    pub async fn started_at(&self) -> Option<DateTime<Utc>> {
        self.launch.lock().await.as_ref().map(|l| l.started_at)
    }

    /// Program of the most recent launch.
    pub async fn program(&self) -> Option<String> {
        self.launch.lock().await.as_ref().map(|l| l.program.clone())
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> ProcessState {
        match self.launch.lock().await.as_ref() {
            None => ProcessState::NotStarted,
            Some(launch) if launch.exited() => ProcessState::Terminated,
            Some(_) => ProcessState::Running,
        }
    }

    async fn live_pid(&self) -> Option<u32> {
        self.launch
            .lock()
            .await
            .as_ref()
            .filter(|launch| !launch.exited())
            .map(|launch| launch.pid)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sleep_cmd(secs: &str) -> ProcessCommand {
        ProcessCommand::new("sleep", [secs])
    }

    #[tokio::test]
    async fn test_unstarted_handle() {
        let process = ManagedProcess::new("idle");
        assert_eq!(process.state().await, ProcessState::NotStarted);
        assert!(!process.is_running().await);
        assert!(process.kill().await.is_ok());
        assert!(process.force_kill().await.is_ok());
        assert!(process.wait().await.is_ok());
        assert!(process.pid().await.is_none());
        assert!(process.shutdown(Duration::from_millis(10)).await.is_ok());
    }

    #[tokio::test]
    async fn test_double_start_rejected() {
        let process = ManagedProcess::new("sleeper");
        process.start(&sleep_cmd("30")).await.unwrap();
        assert!(process.is_running().await);

        let err = process.start(&sleep_cmd("30")).await.unwrap_err();
        assert!(matches!(err, ProcessError::AlreadyRunning { .. }));

        process.shutdown(Duration::from_secs(2)).await.unwrap();
        assert!(!process.is_running().await);
        assert_eq!(process.state().await, ProcessState::Terminated);
    }

    #[tokio::test]
    async fn test_restart_after_exit() {
        let process = ManagedProcess::new("short");
        process
            .start(&ProcessCommand::new("true", Vec::<String>::new()))
            .await
            .unwrap();
        process.wait().await.unwrap();
        assert_eq!(process.state().await, ProcessState::Terminated);

        process.start(&sleep_cmd("30")).await.unwrap();
        assert_eq!(process.state().await, ProcessState::Running);
        process.shutdown(Duration::from_secs(2)).await.unwrap();
    }

    #[tokio::test]
    async fn test_wait_reports_failure_exit() {
        let process = ManagedProcess::new("failing");
        process
            .start(&ProcessCommand::new("sh", ["-c", "exit 3"]))
            .await
            .unwrap();
        let err = process.wait().await.unwrap_err();
        assert!(matches!(err, ProcessError::Exited { .. }));
    }

    #[tokio::test]
    async fn test_spawn_failure_leaves_handle_unstarted() {
        let process = ManagedProcess::new("missing");
        let err = process
            .start(&ProcessCommand::new(
                "/nonexistent/tailswan-test-binary",
                Vec::<String>::new(),
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::Spawn { .. }));
        assert_eq!(process.state().await, ProcessState::NotStarted);
    }

    #[tokio::test]
    async fn test_shutdown_escalates_to_sigkill() {
        let process = ManagedProcess::new("stubborn");
        process
            .start(&ProcessCommand::new(
                "sh",
                ["-c", "trap '' TERM; while true; do sleep 1; done"],
            ))
            .await
            .unwrap();
        // Give the shell a moment to install the trap.
        tokio::time::sleep(Duration::from_millis(200)).await;

        process.shutdown(Duration::from_millis(300)).await.unwrap();
        assert_eq!(process.state().await, ProcessState::Terminated);
    }

    #[tokio::test]
    async fn test_failed_sigterm_still_escalates() {
        let process = ManagedProcess::new("unsignalled");
        process.start(&sleep_cmd("30")).await.unwrap();

        let refused = Err(ProcessError::Signal {
            label: "unsignalled".to_string(),
            reason: "EPERM: Operation not permitted".to_string(),
        });
        process
            .finish_shutdown(Duration::from_millis(200), refused)
            .await
            .unwrap();
        assert_eq!(process.state().await, ProcessState::Terminated);
        assert!(!process.is_running().await);
    }

    #[tokio::test]
    async fn test_signals_after_exit_are_skipped() {
        let process = ManagedProcess::new("done");
        process
            .start(&ProcessCommand::new("true", Vec::<String>::new()))
            .await
            .unwrap();
        process.wait().await.unwrap();

        assert!(process.kill().await.is_ok());
        assert!(process.force_kill().await.is_ok());
        assert!(process.shutdown(Duration::from_millis(10)).await.is_ok());
        assert_eq!(process.state().await, ProcessState::Terminated);
        assert!(process.pid().await.is_some());
    }
}
