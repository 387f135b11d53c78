// src/exec/spawner.rs

//! Pluggable process spawner abstraction.
//!
//! The controller talks to a [`Spawner`] instead of `tokio::process`
//! directly, so tests can hand in a fake that never creates OS processes.
//!
//! - [`TokioSpawner`] is the production implementation. It spawns the
//!   interpreter with piped stdout/stderr, binds those to the controller's
//!   pipes, and watches the child in a background task that posts
//!   [`ControllerEvent::Exited`] exactly once.
//! - [`ProcessRef`] is the controller's handle on a live process.

use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::engine::{ControllerEvent, EventSender};
use crate::errors::{Result, ScriptvisorError};
use crate::exec::pipe::OutputPipe;
use crate::exec::signal::{pid_alive, send_signal};
use crate::types::{ExitInfo, ProcessSignal, RunId};

/// Everything a spawner needs to start one run of a script.
#[derive(Debug, Clone)]
pub struct SpawnRequest {
    /// Interpreter command.
    pub program: String,
    /// Arguments; for scripts this is just the script path.
    pub args: Vec<String>,
    /// Run the exit notification must be tagged with.
    pub run: RunId,
    /// Where the exit notification is posted.
    pub events: EventSender,
}

/// Handle on a spawned process, owned by the controller for the run.
pub trait ProcessRef: Send {
    /// Pid as reported by the live process, `None` once it has been reaped.
    fn id(&self) -> Option<u32>;

    /// Whether the process still exists in the OS process table.
    fn is_alive(&self) -> bool;

    /// Deliver a signal to the process.
    fn signal(&mut self, signal: ProcessSignal) -> Result<()>;
}

/// Trait abstracting how script processes are created.
pub trait Spawner: Send {
    /// Start `request.program` with `request.args`, binding its stdout and
    /// stderr to the given pipes.
    ///
    /// On success the implementation must post exactly one
    /// `ControllerEvent::Exited` for `request.run` once the process ends.
    fn spawn(
        &mut self,
        request: SpawnRequest,
        stdout: &mut OutputPipe,
        stderr: &mut OutputPipe,
    ) -> Result<Box<dyn ProcessRef>>;
}

/// Spawner backed by `tokio::process::Command`.
#[derive(Debug, Clone, Default)]
pub struct TokioSpawner;

impl TokioSpawner {
    pub fn new() -> Self {
        Self
    }
}

impl Spawner for TokioSpawner {
    fn spawn(
        &mut self,
        request: SpawnRequest,
        stdout: &mut OutputPipe,
        stderr: &mut OutputPipe,
    ) -> Result<Box<dyn ProcessRef>> {
        let mut cmd = Command::new(&request.program);
        cmd.args(&request.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|source| ScriptvisorError::SpawnError {
            program: request.program.clone(),
            source,
        })?;

        let pid = child.id().ok_or_else(|| {
            ScriptvisorError::SignalError("spawned process has no pid".to_string())
        })?;

        if let Some(out) = child.stdout.take() {
            stdout.attach(Box::new(out));
        }
        if let Some(err) = child.stderr.take() {
            stderr.attach(Box::new(err));
        }

        let reaped = Arc::new(AtomicBool::new(false));
        let watcher_reaped = Arc::clone(&reaped);
        let run = request.run;
        let events = request.events;

        tokio::spawn(async move {
            let info = match child.wait().await {
                Ok(status) => ExitInfo::from_status(status),
                Err(err) => {
                    warn!(pid, run, error = %err, "error waiting for script process");
                    ExitInfo::default()
                }
            };
            watcher_reaped.store(true, Ordering::SeqCst);
            debug!(pid, run, %info, "script process reaped");
            if events.send(ControllerEvent::Exited { run, info }).is_err() {
                debug!(pid, run, "controller gone before exit could be delivered");
            }
        });

        info!(pid, program = %request.program, args = ?request.args, "script process spawned");

        Ok(Box::new(ChildProcess { pid, reaped }))
    }
}

/// [`ProcessRef`] for a child spawned by [`TokioSpawner`].
///
/// The `Child` itself lives in the watcher task; this handle signals by pid
/// and stops doing so once the watcher has reaped the process, so a recycled
/// pid is never targeted through it.
#[derive(Debug)]
struct ChildProcess {
    pid: u32,
    reaped: Arc<AtomicBool>,
}

impl ChildProcess {
    fn reaped(&self) -> bool {
        self.reaped.load(Ordering::SeqCst)
    }
}

impl ProcessRef for ChildProcess {
    fn id(&self) -> Option<u32> {
        if self.reaped() { None } else { Some(self.pid) }
    }

    fn is_alive(&self) -> bool {
        !self.reaped() && pid_alive(self.pid)
    }

    fn signal(&mut self, signal: ProcessSignal) -> Result<()> {
        if self.reaped() {
            debug!(pid = self.pid, %signal, "process already reaped; signal not sent");
            return Ok(());
        }
        send_signal(self.pid, signal)
    }
}
