// src/engine/controller.rs

//! Per-script process controller.
//!
//! A [`ProcessController`] owns exactly one script's lifecycle: its state,
//! its process handle and its two output pipes. `start()` and `stop()` return
//! immediately; everything that happens afterwards (output, exit, the
//! termination check) arrives as a [`ControllerEvent`] and is applied by
//! [`ProcessController::dispatch`], the only place besides `start`/`stop`
//! that mutates the controller.
//!
//! The controller is meant to be driven from a single task. Nothing in it
//! is shared, so no locking is needed.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info, info_span, warn};

use crate::engine::verifier::{VerifyOutcome, verify_termination};
use crate::engine::{ControllerEvent, ControllerOptions, EventReceiver, EventSender, Notifier};
use crate::errors::{Result, ScriptvisorError};
use crate::exec::{
    LineSplitter, OutputPipe, ProcessRef, SpawnRequest, Spawner, Timer, TokioSpawner, TokioTimer,
};
use crate::fs::{FileSystem, RealFileSystem};
use crate::types::{ExitInfo, ProcessSignal, ProcessState, RunId, StreamKind};

pub struct ProcessController<S: Spawner = TokioSpawner, T: Timer = TokioTimer> {
    path: PathBuf,
    options: ControllerOptions,
    state: ProcessState,
    run: RunId,

    process: Option<Box<dyn ProcessRef>>,
    /// Snapshot taken at spawn; kept after `process` is cleared.
    pid: Option<u32>,

    stdout: Option<OutputPipe>,
    stderr: Option<OutputPipe>,
    stdout_lines: LineSplitter,
    stderr_lines: LineSplitter,

    /// Exit reported by the OS, waiting for the pipes to drain.
    pending_exit: Option<ExitInfo>,
    exit_seen: bool,
    exit_notified: bool,
    verify_outcome: Option<VerifyOutcome>,

    notifier: Notifier,
    spawner: S,
    timer: T,
    fs: Arc<dyn FileSystem>,

    events_tx: EventSender,
    events_rx: EventReceiver,
}

impl<S: Spawner, T: Timer> std::fmt::Debug for ProcessController<S, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessController")
            .field("path", &self.path)
            .field("state", &self.state)
            .field("run", &self.run)
            .field("pid", &self.pid)
            .field("notifier", &self.notifier)
            .finish_non_exhaustive()
    }
}

impl ProcessController {
    /// Controller for `path` backed by real processes, timers and files.
    pub fn new(path: impl Into<PathBuf>, options: ControllerOptions) -> Self {
        Self::with_backends(
            path,
            options,
            TokioSpawner::new(),
            TokioTimer::new(),
            Arc::new(RealFileSystem),
        )
    }
}

impl<S: Spawner, T: Timer> ProcessController<S, T> {
    pub fn with_backends(
        path: impl Into<PathBuf>,
        options: ControllerOptions,
        spawner: S,
        timer: T,
        fs: Arc<dyn FileSystem>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            path: path.into(),
            options,
            state: ProcessState::Idle,
            run: 0,
            process: None,
            pid: None,
            stdout: None,
            stderr: None,
            stdout_lines: LineSplitter::new(),
            stderr_lines: LineSplitter::new(),
            pending_exit: None,
            exit_seen: false,
            exit_notified: false,
            verify_outcome: None,
            notifier: Notifier::new(),
            spawner,
            timer,
            fs,
            events_tx,
            events_rx,
        }
    }

    // ----- observers -------------------------------------------------------

    pub fn on_stdout_line<F>(&mut self, f: F)
    where
        F: FnMut(&str) + Send + 'static,
    {
        self.notifier.set_on_stdout_line(Some(Box::new(f)));
    }

    pub fn on_stderr_line<F>(&mut self, f: F)
    where
        F: FnMut(&str) + Send + 'static,
    {
        self.notifier.set_on_stderr_line(Some(Box::new(f)));
    }

    pub fn on_exit<F>(&mut self, f: F)
    where
        F: FnMut(ExitInfo) + Send + 'static,
    {
        self.notifier.set_on_exit(Some(Box::new(f)));
    }

    /// Remove all observers.
    pub fn clear_callbacks(&mut self) {
        self.notifier = Notifier::new();
    }

    // ----- inspection ------------------------------------------------------

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn options(&self) -> &ControllerOptions {
        &self.options
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    /// Derived from [`state`](Self::state); never stored separately.
    pub fn running(&self) -> bool {
        self.state.is_running()
    }

    /// Pid captured when the current (or last) run was spawned.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn run_id(&self) -> RunId {
        self.run
    }

    /// True while the OS process of the current run is not confirmed gone.
    pub fn has_live_process(&self) -> bool {
        self.process.is_some()
    }

    /// True when neither pipe can deliver any more output.
    pub fn pipes_closed(&self) -> bool {
        self.stdout.as_ref().is_none_or(OutputPipe::is_closing)
            && self.stderr.as_ref().is_none_or(OutputPipe::is_closing)
    }

    /// Whether `on_exit` has been delivered for the current run.
    pub fn exit_notified(&self) -> bool {
        self.exit_notified
    }

    /// Result of the termination check for the current run, once it fired.
    pub fn verify_outcome(&self) -> Option<VerifyOutcome> {
        self.verify_outcome
    }

    /// A sender into this controller's event queue.
    pub fn event_sender(&self) -> EventSender {
        self.events_tx.clone()
    }

    // ----- lifecycle -------------------------------------------------------

    /// Start the script. Returns false (and logs why) on failure.
    pub fn start(&mut self) -> bool {
        self.try_start().is_ok()
    }

    /// Start the script, returning the typed failure.
    pub fn try_start(&mut self) -> Result<()> {
        if self.state.is_running() {
            warn!(script = %self.path.display(), state = %self.state, "start requested but script is already running");
            return Err(ScriptvisorError::AlreadyRunning(self.path.clone()));
        }
        if self.process.is_some() {
            warn!(
                script = %self.path.display(),
                pid = ?self.pid,
                "start requested while the previous run is still shutting down"
            );
            return Err(ScriptvisorError::AlreadyRunning(self.path.clone()));
        }
        if !self.script_readable() {
            error!(script = %self.path.display(), "script does not exist or is not readable");
            return Err(ScriptvisorError::ScriptNotFound(self.path.clone()));
        }

        // Deliver the exit of the previous run before it is forgotten.
        if self.pending_exit.is_some() {
            self.finish_exit();
        }

        self.set_state(ProcessState::Starting);
        self.begin_run();

        let mut stdout = OutputPipe::new(StreamKind::Stdout);
        let mut stderr = OutputPipe::new(StreamKind::Stderr);
        let request = SpawnRequest {
            program: self.options.interpreter.clone(),
            args: vec![self.path.to_string_lossy().into_owned()],
            run: self.run,
            events: self.events_tx.clone(),
        };

        let process = match self.spawner.spawn(request, &mut stdout, &mut stderr) {
            Ok(process) => process,
            Err(err) => {
                stdout.close();
                stderr.close();
                error!(
                    script = %self.path.display(),
                    interpreter = %self.options.interpreter,
                    error = %err,
                    "failed to spawn script"
                );
                self.set_state(ProcessState::Idle);
                return Err(err);
            }
        };

        self.pid = process.id();
        self.process = Some(process);
        self.stdout = self.open_pipe(stdout);
        self.stderr = self.open_pipe(stderr);
        self.set_state(ProcessState::Running);

        info!(
            script = %self.path.display(),
            pid = ?self.pid,
            run = self.run,
            "script started"
        );
        Ok(())
    }

    /// Request termination of the running script.
    ///
    /// Closes both pipes, sends the graceful signal and schedules the
    /// termination check. Does not wait for the process to die. Calling it
    /// with nothing running is a successful no-op.
    pub fn stop(&mut self) -> bool {
        if !self.state.is_running() {
            info!(script = %self.path.display(), state = %self.state, "already stopped");
            return true;
        }

        self.set_state(ProcessState::Stopping);
        self.close_pipes();

        let signal = self.options.stop_signal;
        let stored_pid = self.pid;
        if let Some(process) = self.process.as_mut() {
            match process.id() {
                // Reaped already; its exit event is still queued.
                None => debug!(
                    script = %self.path.display(),
                    pid = ?stored_pid,
                    "process already gone, exit pending; no signal sent"
                ),
                Some(live_pid) => {
                    if Some(live_pid) != stored_pid {
                        warn!(
                            script = %self.path.display(),
                            stored_pid = ?stored_pid,
                            live_pid,
                            "pid mismatch between spawn snapshot and live process; signalling anyway"
                        );
                    }
                    match process.signal(signal) {
                        Ok(()) => {
                            info!(script = %self.path.display(), pid = ?stored_pid, %signal, "termination signal sent")
                        }
                        Err(err) => {
                            warn!(script = %self.path.display(), pid = ?stored_pid, %signal, error = %err, "failed to send termination signal")
                        }
                    }
                }
            }

            self.timer.schedule(
                self.options.grace_delay,
                ControllerEvent::VerifyTick { run: self.run },
                self.events_tx.clone(),
            );
        }

        self.set_state(ProcessState::Stopped);
        true
    }

    // ----- event loop ------------------------------------------------------

    /// Apply one event. This is the single entry point for everything that
    /// happens asynchronously after `start()`.
    pub fn dispatch(&mut self, event: ControllerEvent) {
        if event.run() != self.run {
            debug!(
                script = %self.path.display(),
                event_run = event.run(),
                run = self.run,
                "dropping event from a previous run"
            );
            return;
        }

        match event {
            ControllerEvent::Output { stream, chunk, .. } => self.handle_output(stream, &chunk),
            ControllerEvent::StreamClosed { stream, .. } => self.handle_stream_closed(stream),
            ControllerEvent::Exited { info, .. } => self.handle_exit(info),
            ControllerEvent::VerifyTick { .. } => self.handle_verify_tick(),
            ControllerEvent::DrainDeadline { .. } => self.handle_drain_deadline(),
        }
    }

    /// Wait for the next event and apply it.
    pub async fn turn(&mut self) {
        if let Some(event) = self.events_rx.recv().await {
            self.dispatch(event);
        }
    }

    /// Apply every event that is already queued, without waiting.
    pub fn dispatch_pending(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            self.dispatch(event);
            applied += 1;
        }
        applied
    }

    /// Keep applying events until the current run's exit has been reported.
    /// Returns immediately if nothing was ever started.
    pub async fn wait_for_exit(&mut self) {
        while self.process.is_some() || self.pending_exit.is_some() {
            self.turn().await;
        }
    }

    // ----- handlers --------------------------------------------------------

    fn handle_output(&mut self, stream: StreamKind, chunk: &[u8]) {
        let open = match stream {
            StreamKind::Stdout => self.stdout.as_ref(),
            StreamKind::Stderr => self.stderr.as_ref(),
        }
        .is_some_and(|pipe| !pipe.is_closing());
        if !open {
            debug!(script = %self.path.display(), %stream, "dropping output from closed pipe");
            return;
        }

        let lines = match stream {
            StreamKind::Stdout => self.stdout_lines.push(chunk),
            StreamKind::Stderr => self.stderr_lines.push(chunk),
        };
        for line in lines {
            self.notifier.line(stream, &line);
        }
    }

    fn handle_stream_closed(&mut self, stream: StreamKind) {
        let (pipe, splitter) = match stream {
            StreamKind::Stdout => (self.stdout.take(), &mut self.stdout_lines),
            StreamKind::Stderr => (self.stderr.take(), &mut self.stderr_lines),
        };
        let Some(mut pipe) = pipe else {
            return;
        };
        pipe.close();

        if let Some(last) = splitter.finish() {
            self.notifier.line(stream, &last);
        }
        debug!(script = %self.path.display(), %stream, "pipe reached end of stream");

        if self.pending_exit.is_some() && self.stdout.is_none() && self.stderr.is_none() {
            self.finish_exit();
        }
    }

    fn handle_exit(&mut self, info: ExitInfo) {
        if self.exit_seen {
            debug!(script = %self.path.display(), run = self.run, "duplicate exit ignored");
            return;
        }
        self.exit_seen = true;
        self.process = None;

        if self.state.is_running() {
            self.set_state(ProcessState::Stopped);
        }

        info!(
            script = %self.path.display(),
            pid = ?self.pid,
            code = ?info.code,
            signal = ?info.signal,
            "script exited ({info})"
        );

        self.pending_exit = Some(info);
        if self.stdout.is_none() && self.stderr.is_none() {
            self.finish_exit();
        } else {
            self.timer.schedule(
                self.options.drain_timeout,
                ControllerEvent::DrainDeadline { run: self.run },
                self.events_tx.clone(),
            );
        }
    }

    fn handle_drain_deadline(&mut self) {
        if self.pending_exit.is_some() {
            debug!(script = %self.path.display(), "drain window elapsed; cutting off remaining output");
            self.finish_exit();
        }
    }

    fn handle_verify_tick(&mut self) {
        if self.verify_outcome.is_some() {
            return;
        }
        let span = info_span!("verify", script = %self.path.display());
        let _guard = span.enter();
        let outcome = verify_termination(self.process.as_deref_mut(), self.pid, self.run);
        self.verify_outcome = Some(outcome);
    }

    // ----- helpers ---------------------------------------------------------

    fn set_state(&mut self, next: ProcessState) {
        if self.state == next {
            return;
        }
        if !self.state.can_transition_to(next) {
            warn!(
                script = %self.path.display(),
                from = %self.state,
                to = %next,
                "unexpected state transition"
            );
        }
        debug!(script = %self.path.display(), from = %self.state, to = %next, "state transition");
        self.state = next;
    }

    fn script_readable(&self) -> bool {
        self.fs.is_file(&self.path) && self.fs.open_read(&self.path).is_ok()
    }

    fn begin_run(&mut self) {
        self.run += 1;
        self.pid = None;
        self.pending_exit = None;
        self.exit_seen = false;
        self.exit_notified = false;
        self.verify_outcome = None;
        self.stdout_lines.reset();
        self.stderr_lines.reset();
    }

    /// Start reading a freshly bound pipe. A pipe the spawner left unbound
    /// has nothing to deliver and is closed straight away.
    fn open_pipe(&self, mut pipe: OutputPipe) -> Option<OutputPipe> {
        if pipe.read_start(self.run, self.events_tx.clone()) {
            Some(pipe)
        } else {
            pipe.close();
            None
        }
    }

    fn close_pipes(&mut self) {
        if let Some(mut pipe) = self.stdout.take() {
            pipe.close();
        }
        if let Some(mut pipe) = self.stderr.take() {
            pipe.close();
        }
        self.stdout_lines.reset();
        self.stderr_lines.reset();
    }

    fn finish_exit(&mut self) {
        let Some(info) = self.pending_exit.take() else {
            return;
        };
        self.close_pipes();
        if !self.exit_notified {
            self.exit_notified = true;
            self.notifier.exit(info);
        }
    }
}

impl<S: Spawner, T: Timer> Drop for ProcessController<S, T> {
    fn drop(&mut self) {
        if let Some(process) = self.process.as_mut() {
            if process.is_alive() {
                warn!(script = %self.path.display(), pid = ?self.pid, "controller dropped with live process; killing it");
                let _ = process.signal(ProcessSignal::Kill);
            }
        }
    }
}
