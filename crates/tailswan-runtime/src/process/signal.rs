//! PID-level signalling for managed processes.
//!
//! The child handle is owned by the reaper task, so termination and liveness
//! probes go through the PID instead of `Child::kill`.

use std::io;

#[cfg(unix)]
use nix::errno::Errno;
#[cfg(unix)]
use nix::sys::signal::{self, Signal};
#[cfg(unix)]
use nix::unistd::Pid;

/// Which signal to deliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopSignal {
    /// SIGTERM: ask the process to exit.
    Terminate,
    /// SIGKILL: force the process to exit.
    Kill,
}

/// Send `sig` to `pid`.
///
/// Returns `Ok(false)` if the process no longer exists (ESRCH).
#[cfg(unix)]
pub fn send(pid: u32, sig: StopSignal) -> io::Result<bool> {
    let signal = match sig {
        StopSignal::Terminate => Signal::SIGTERM,
        StopSignal::Kill => Signal::SIGKILL,
    };
    match signal::kill(to_pid(pid)?, signal) {
        Ok(()) => Ok(true),
        Err(Errno::ESRCH) => Ok(false),
        Err(e) => Err(io::Error::other(e)),
    }
}

#[cfg(not(unix))]
pub fn send(_pid: u32, _sig: StopSignal) -> io::Result<bool> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "signals are only supported on unix",
    ))
}

/// Probe `pid` with the null signal. Any error counts as "not alive".
#[cfg(unix)]
pub fn probe(pid: u32) -> bool {
    to_pid(pid).is_ok_and(|pid| signal::kill(pid, None).is_ok())
}

#[cfg(not(unix))]
pub fn probe(_pid: u32) -> bool {
    false
}

#[cfg(unix)]
fn to_pid(pid: u32) -> io::Result<Pid> {
    i32::try_from(pid)
        .map(Pid::from_raw)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, format!("invalid pid {pid}")))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_probe_nonexistent_pid() {
        // PID 999999 should not exist
        assert!(!probe(999_999));
    }

    #[test]
    fn test_probe_self() {
        assert!(probe(std::process::id()));
    }

    #[test]
    fn test_signal_nonexistent_pid_reports_gone() {
        assert!(!send(999_999, StopSignal::Terminate).unwrap());
    }

    #[test]
    fn test_out_of_range_pid_is_rejected() {
        assert!(send(u32::MAX, StopSignal::Terminate).is_err());
        assert!(!probe(u32::MAX));
    }
}
