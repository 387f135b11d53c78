// src/exec/signal.rs

//! Signal delivery and liveness checks by raw pid.
//!
//! The OS process table is shared with everything else on the machine: a pid
//! can be reused between a liveness check and a signal. Callers accept that race.

use crate::errors::{Result, ScriptvisorError};
use crate::types::ProcessSignal;

#[cfg(unix)]
mod imp {
    use nix::errno::Errno;
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    use super::*;

    fn to_pid(pid: u32) -> Result<Pid> {
        let raw = i32::try_from(pid)
            .map_err(|_| ScriptvisorError::SignalError(format!("pid {pid} out of range")))?;
        if raw <= 0 {
            return Err(ScriptvisorError::SignalError(format!("refusing to signal pid {raw}")));
        }
        Ok(Pid::from_raw(raw))
    }

    fn to_nix(signal: ProcessSignal) -> Signal {
        match signal {
            ProcessSignal::Terminate => Signal::SIGTERM,
            ProcessSignal::Interrupt => Signal::SIGINT,
            ProcessSignal::Hangup => Signal::SIGHUP,
            ProcessSignal::Kill => Signal::SIGKILL,
        }
    }

    pub fn send_signal(pid: u32, signal: ProcessSignal) -> Result<()> {
        kill(to_pid(pid)?, to_nix(signal))
            .map_err(|errno| ScriptvisorError::SignalError(format!("{signal} to pid {pid}: {errno}")))
    }

    pub fn pid_alive(pid: u32) -> bool {
        let Ok(target) = to_pid(pid) else {
            return false;
        };
        // EPERM: the process exists but belongs to someone else.
        matches!(kill(target, None), Ok(()) | Err(Errno::EPERM))
    }
}

#[cfg(not(unix))]
mod imp {
    use super::*;

    pub fn send_signal(pid: u32, signal: ProcessSignal) -> Result<()> {
        Err(ScriptvisorError::SignalError(format!(
            "{signal} to pid {pid}: signals are not supported on this platform"
        )))
    }

    pub fn pid_alive(_pid: u32) -> bool {
        false
    }
}

/// Deliver `signal` to the process with the given pid.
pub fn send_signal(pid: u32, signal: ProcessSignal) -> Result<()> {
    imp::send_signal(pid, signal)
}

/// Probe whether a process with this pid currently exists.
pub fn pid_alive(pid: u32) -> bool {
    imp::pid_alive(pid)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn own_process_is_alive() {
        assert!(pid_alive(std::process::id()));
    }

    #[test]
    fn pid_zero_is_never_checked() {
        assert!(!pid_alive(0));
        assert!(send_signal(0, ProcessSignal::Terminate).is_err());
    }

    #[test]
    fn out_of_range_pid_is_rejected() {
        assert!(!pid_alive(u32::MAX));
    }
}
