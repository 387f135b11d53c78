use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Monotonic counter identifying one start-to-exit lifetime of a script.
///
/// Every event produced by a pipe, the exit watcher or a timer carries the
/// run it belongs to, so late events from an earlier run can be discarded.
pub type RunId = u64;

/// Lifecycle state of a supervised script.
///
/// - `Idle`: constructed, or a failed start reverted.
/// - `Starting`: spawn requested, not yet confirmed.
/// - `Running`: process spawned and pipes are being read.
/// - `Stopping`: `stop()` is tearing the run down.
/// - `Stopped`: the run ended (natural exit or `stop()` completed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ProcessState {
    #[default]
    Idle,
    Starting,
    Running,
    Stopping,
    Stopped,
}

impl ProcessState {
    /// Whether a process is considered running in this state.
    pub fn is_running(self) -> bool {
        matches!(self, ProcessState::Starting | ProcessState::Running)
    }

    /// Whether `self -> next` is one of the documented transitions.
    pub fn can_transition_to(self, next: ProcessState) -> bool {
        use ProcessState::*;
        matches!(
            (self, next),
            (Idle, Starting)
                | (Starting, Running)
                | (Starting, Idle)
                | (Starting, Stopped)
                | (Running, Stopping)
                | (Running, Stopped)
                | (Stopping, Stopped)
                | (Stopped, Starting)
                | (Stopped, Idle)
        )
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProcessState::Idle => "idle",
            ProcessState::Starting => "starting",
            ProcessState::Running => "running",
            ProcessState::Stopping => "stopping",
            ProcessState::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// Which output stream of the child a pipe is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamKind::Stdout => f.write_str("stdout"),
            StreamKind::Stderr => f.write_str("stderr"),
        }
    }
}

/// Signals the supervisor can deliver to a script process.
///
/// `Terminate`, `Interrupt` and `Hangup` are usable as the graceful stop
/// signal; `Kill` is reserved for escalation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessSignal {
    #[default]
    Terminate,
    Interrupt,
    Hangup,
    Kill,
}

impl ProcessSignal {
    /// POSIX signal number.
    pub fn number(self) -> i32 {
        match self {
            ProcessSignal::Hangup => 1,
            ProcessSignal::Interrupt => 2,
            ProcessSignal::Kill => 9,
            ProcessSignal::Terminate => 15,
        }
    }
}

impl fmt::Display for ProcessSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProcessSignal::Terminate => "SIGTERM",
            ProcessSignal::Interrupt => "SIGINT",
            ProcessSignal::Hangup => "SIGHUP",
            ProcessSignal::Kill => "SIGKILL",
        };
        f.write_str(s)
    }
}

impl FromStr for ProcessSignal {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        let name = normalized.strip_prefix("sig").unwrap_or(&normalized);
        match name {
            "term" | "terminate" => Ok(ProcessSignal::Terminate),
            "int" | "interrupt" => Ok(ProcessSignal::Interrupt),
            "hup" | "hangup" => Ok(ProcessSignal::Hangup),
            "kill" => Ok(ProcessSignal::Kill),
            other => Err(format!(
                "invalid signal: {other} (expected \"terminate\", \"interrupt\", \"hangup\" or \"kill\")"
            )),
        }
    }
}

/// How a script process ended, as reported by the OS.
///
/// `code` is set for a normal exit, `signal` when the process was terminated
/// by a signal. Both are `None` if the exit status could not be obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExitInfo {
    pub code: Option<i32>,
    pub signal: Option<i32>,
}

impl ExitInfo {
    pub fn code(code: i32) -> Self {
        Self {
            code: Some(code),
            signal: None,
        }
    }

    pub fn signal(signal: i32) -> Self {
        Self {
            code: None,
            signal: Some(signal),
        }
    }

    /// True for a clean `exit(0)`.
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    pub(crate) fn from_status(status: std::process::ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = {
            use std::os::unix::process::ExitStatusExt;
            status.signal()
        };
        #[cfg(not(unix))]
        let signal = None;

        Self {
            code: status.code(),
            signal,
        }
    }
}

impl fmt::Display for ExitInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code, self.signal) {
            (Some(code), _) => write!(f, "exit code {code}"),
            (None, Some(sig)) => write!(f, "terminated by signal {sig}"),
            (None, None) => f.write_str("unknown exit status"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn running_is_derived_from_state() {
        assert!(!ProcessState::Idle.is_running());
        assert!(ProcessState::Starting.is_running());
        assert!(ProcessState::Running.is_running());
        assert!(!ProcessState::Stopping.is_running());
        assert!(!ProcessState::Stopped.is_running());
    }

    #[test]
    fn idle_cannot_skip_starting() {
        assert!(!ProcessState::Idle.can_transition_to(ProcessState::Running));
        assert!(ProcessState::Idle.can_transition_to(ProcessState::Starting));
        assert!(ProcessState::Stopped.can_transition_to(ProcessState::Starting));
        assert!(!ProcessState::Stopping.can_transition_to(ProcessState::Running));
    }

    #[test]
    fn signal_names_parse() {
        assert_eq!("SIGTERM".parse(), Ok(ProcessSignal::Terminate));
        assert_eq!("hup".parse(), Ok(ProcessSignal::Hangup));
        assert_eq!(" Interrupt ".parse(), Ok(ProcessSignal::Interrupt));
        assert!("usr1".parse::<ProcessSignal>().is_err());
    }

    #[test]
    fn default_stop_signal_is_terminate() {
        assert_eq!(ProcessSignal::default(), ProcessSignal::Terminate);
    }

    #[test]
    fn exit_info_display() {
        assert_eq!(ExitInfo::code(3).to_string(), "exit code 3");
        assert_eq!(ExitInfo::signal(9).to_string(), "terminated by signal 9");
        assert!(ExitInfo::code(0).success());
        assert!(!ExitInfo::signal(15).success());
    }
}
