// src/engine/mod.rs

//! Supervision engine for scriptvisor.
//!
//! This module ties together:
//! - the per-script process controller (lifecycle state machine)
//! - the notifier that delivers line/exit callbacks to observers
//! - the termination verifier that escalates a stop that did not take
//! - the async runtime that drives one controller from a command channel
//!
//! Pipes, the exit watcher and timers never touch controller state directly;
//! they post [`ControllerEvent`]s which the controller consumes one at a
//! time through [`ProcessController::dispatch`].

use std::time::Duration;

use tokio::sync::mpsc;

use crate::types::{ExitInfo, ProcessSignal, RunId, StreamKind};

/// Events flowing into a controller from its pipes, exit watcher and timer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerEvent {
    /// A chunk of raw bytes was read from one of the output pipes.
    Output {
        run: RunId,
        stream: StreamKind,
        chunk: Vec<u8>,
    },
    /// A pipe reached end of stream (or failed to read).
    StreamClosed { run: RunId, stream: StreamKind },
    /// The OS reported that the process terminated.
    Exited { run: RunId, info: ExitInfo },
    /// The grace delay after a stop request elapsed.
    VerifyTick { run: RunId },
    /// The window for draining output after a natural exit elapsed.
    DrainDeadline { run: RunId },
}

impl ControllerEvent {
    /// The run this event belongs to.
    pub fn run(&self) -> RunId {
        match self {
            ControllerEvent::Output { run, .. }
            | ControllerEvent::StreamClosed { run, .. }
            | ControllerEvent::Exited { run, .. }
            | ControllerEvent::VerifyTick { run }
            | ControllerEvent::DrainDeadline { run } => *run,
        }
    }
}

/// Sending half of a controller's event channel.
pub type EventSender = mpsc::UnboundedSender<ControllerEvent>;

/// Receiving half of a controller's event channel.
pub type EventReceiver = mpsc::UnboundedReceiver<ControllerEvent>;

/// Tunables for a single controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerOptions {
    /// Interpreter command; the script path is its sole argument.
    pub interpreter: String,
    /// Delay between the graceful signal and the termination check.
    pub grace_delay: Duration,
    /// How long to keep reading output after a natural exit.
    pub drain_timeout: Duration,
    /// Signal sent by `stop()`.
    pub stop_signal: ProcessSignal,
}

pub const DEFAULT_INTERPRETER: &str = "lua";
pub const DEFAULT_GRACE_DELAY: Duration = Duration::from_millis(500);
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_millis(100);

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            interpreter: DEFAULT_INTERPRETER.to_string(),
            grace_delay: DEFAULT_GRACE_DELAY,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
            stop_signal: ProcessSignal::Terminate,
        }
    }
}

/// Control messages accepted by [`ScriptRuntime`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeCommand {
    Start,
    Stop,
    Shutdown,
}

/// Runtime options used by the async driver.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeOptions {
    /// If true, the runtime returns once the script exits on its own.
    pub exit_when_idle: bool,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            exit_when_idle: true,
        }
    }
}

pub mod controller;
pub mod notifier;
pub mod runtime;
pub mod verifier;

pub use controller::ProcessController;
pub use notifier::Notifier;
pub use runtime::ScriptRuntime;
pub use verifier::VerifyOutcome;
