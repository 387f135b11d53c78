// src/engine/verifier.rs

//! Termination verification after a stop request.
//!
//! `stop()` sends the graceful signal and schedules a single
//! [`ControllerEvent::VerifyTick`](crate::engine::ControllerEvent) after the
//! grace delay. When it fires the controller calls [`verify_termination`],
//! which escalates to `Kill` if the process is still there. There is no
//! retry beyond that one escalation.

use tracing::{error, info, warn};

use crate::exec::ProcessRef;
use crate::types::{ProcessSignal, RunId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// The exit event for this run was already handled.
    AlreadyExited,
    /// The process is gone; its exit event may still be in flight.
    Confirmed,
    /// The process survived the grace delay and was sent `Kill`.
    Escalated,
    /// The process survived and the `Kill` could not be delivered.
    EscalationFailed,
}

/// Check whether the process for `run` actually died and escalate if not.
///
/// `process` is `None` once the exit for the run has been processed, which is
/// the "already confirmed dead" guard shared with the exit path.
pub fn verify_termination(
    process: Option<&mut (dyn ProcessRef + 'static)>,
    pid: Option<u32>,
    run: RunId,
) -> VerifyOutcome {
    let Some(process) = process else {
        info!(run, ?pid, "verified termination (exit already reported)");
        return VerifyOutcome::AlreadyExited;
    };

    if !process.is_alive() {
        info!(run, ?pid, "verified termination");
        return VerifyOutcome::Confirmed;
    }

    warn!(
        run,
        ?pid,
        "process survived graceful termination; escalating to SIGKILL"
    );
    match process.signal(ProcessSignal::Kill) {
        Ok(()) => VerifyOutcome::Escalated,
        Err(err) => {
            error!(run, ?pid, error = %err, "failed to deliver SIGKILL");
            VerifyOutcome::EscalationFailed
        }
    }
}
