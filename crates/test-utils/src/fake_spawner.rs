//! In-memory stand-in for `TokioSpawner`.
//!
//! Every spawn hands the controller a [`FakeProcess`] whose stdout/stderr are
//! `tokio::io::duplex` streams. Tests drive the other end: write output,
//! close the streams, report an exit, or decide how the process reacts to
//! signals.

use std::io;
use std::sync::{Arc, Mutex};

use scriptvisor::engine::{ControllerEvent, EventSender};
use scriptvisor::errors::{Result, ScriptvisorError};
use scriptvisor::exec::{OutputPipe, ProcessRef, SpawnRequest, Spawner};
use scriptvisor::types::{ExitInfo, ProcessSignal, RunId};
use tokio::io::{AsyncWriteExt, DuplexStream, duplex};

const PIPE_CAPACITY: usize = 64 * 1024;

/// What the controller asked to spawn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedSpawn {
    pub program: String,
    pub args: Vec<String>,
    pub run: RunId,
}

#[derive(Debug)]
struct SpawnerState {
    requests: Vec<RecordedSpawn>,
    processes: Vec<FakeProcess>,
    fail_next: Option<io::ErrorKind>,
    next_pid: u32,
}

/// Cloneable fake spawner; clones share the same recorded state.
#[derive(Debug, Clone)]
pub struct FakeSpawner {
    state: Arc<Mutex<SpawnerState>>,
}

impl Default for FakeSpawner {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeSpawner {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SpawnerState {
                requests: Vec::new(),
                processes: Vec::new(),
                fail_next: None,
                next_pid: 4000,
            })),
        }
    }

    /// Make the next spawn fail with an I/O error of `kind`.
    pub fn fail_next(&self, kind: io::ErrorKind) {
        self.state.lock().unwrap().fail_next = Some(kind);
    }

    pub fn requests(&self) -> Vec<RecordedSpawn> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn spawn_count(&self) -> usize {
        self.state.lock().unwrap().processes.len()
    }

    /// Handle on the process created by the most recent successful spawn.
    pub fn last_process(&self) -> FakeProcess {
        self.state
            .lock()
            .unwrap()
            .processes
            .last()
            .cloned()
            .expect("no process has been spawned")
    }
}

impl Spawner for FakeSpawner {
    fn spawn(
        &mut self,
        request: SpawnRequest,
        stdout: &mut OutputPipe,
        stderr: &mut OutputPipe,
    ) -> Result<Box<dyn ProcessRef>> {
        let mut state = self.state.lock().unwrap();
        state.requests.push(RecordedSpawn {
            program: request.program.clone(),
            args: request.args.clone(),
            run: request.run,
        });

        if let Some(kind) = state.fail_next.take() {
            return Err(ScriptvisorError::SpawnError {
                program: request.program,
                source: io::Error::new(kind, "fake spawn failure"),
            });
        }

        let pid = state.next_pid;
        state.next_pid += 1;

        let (out_reader, out_writer) = duplex(PIPE_CAPACITY);
        let (err_reader, err_writer) = duplex(PIPE_CAPACITY);
        stdout.attach(Box::new(out_reader));
        stderr.attach(Box::new(err_reader));

        let inner = Arc::new(Mutex::new(ProcessInner {
            pid,
            reported_pid: None,
            alive: true,
            exit_sent: false,
            ignore_graceful: false,
            fail_signals: false,
            signals: Vec::new(),
            stdout: Some(out_writer),
            stderr: Some(err_writer),
            run: request.run,
            events: request.events,
        }));
        state.processes.push(FakeProcess {
            inner: Arc::clone(&inner),
        });

        Ok(Box::new(FakeProcessRef { inner }))
    }
}

#[derive(Debug)]
struct ProcessInner {
    pid: u32,
    reported_pid: Option<u32>,
    alive: bool,
    exit_sent: bool,
    ignore_graceful: bool,
    fail_signals: bool,
    signals: Vec<ProcessSignal>,
    stdout: Option<DuplexStream>,
    stderr: Option<DuplexStream>,
    run: RunId,
    events: EventSender,
}

impl ProcessInner {
    fn report_exit(&mut self, info: ExitInfo) {
        self.alive = false;
        if self.exit_sent {
            return;
        }
        self.exit_sent = true;
        let _ = self.events.send(ControllerEvent::Exited {
            run: self.run,
            info,
        });
    }

    fn close_output(&mut self) {
        self.stdout = None;
        self.stderr = None;
    }
}

/// Test-side handle on a spawned fake process.
#[derive(Debug, Clone)]
pub struct FakeProcess {
    inner: Arc<Mutex<ProcessInner>>,
}

impl FakeProcess {
    pub fn pid(&self) -> u32 {
        self.inner.lock().unwrap().pid
    }

    pub fn is_alive(&self) -> bool {
        self.inner.lock().unwrap().alive
    }

    /// Signals the controller delivered, in order.
    pub fn signals(&self) -> Vec<ProcessSignal> {
        self.inner.lock().unwrap().signals.clone()
    }

    /// Survive every signal except `Kill`.
    pub fn set_ignore_graceful(&self, ignore: bool) {
        self.inner.lock().unwrap().ignore_graceful = ignore;
    }

    /// Make every signal delivery fail.
    pub fn set_fail_signals(&self, fail: bool) {
        self.inner.lock().unwrap().fail_signals = fail;
    }

    /// Have the live handle report `pid` instead of the spawned one.
    pub fn set_reported_pid(&self, pid: u32) {
        self.inner.lock().unwrap().reported_pid = Some(pid);
    }

    pub async fn write_stdout(&self, data: impl AsRef<[u8]>) {
        let writer = self.inner.lock().unwrap().stdout.take();
        if let Some(writer) = writer {
            let writer = self.write(writer, data.as_ref()).await;
            self.inner.lock().unwrap().stdout = writer;
        }
    }

    pub async fn write_stderr(&self, data: impl AsRef<[u8]>) {
        let writer = self.inner.lock().unwrap().stderr.take();
        if let Some(writer) = writer {
            let writer = self.write(writer, data.as_ref()).await;
            self.inner.lock().unwrap().stderr = writer;
        }
    }

    async fn write(&self, mut writer: DuplexStream, data: &[u8]) -> Option<DuplexStream> {
        // The controller may already have closed its end.
        if writer.write_all(data).await.is_err() {
            return None;
        }
        let _ = writer.flush().await;
        self.is_alive().then_some(writer)
    }

    /// Close stdout and stderr, as a process does when it exits.
    pub fn close_output(&self) {
        self.inner.lock().unwrap().close_output();
    }

    /// Report an exit with `code` without closing the output streams.
    pub fn exit(&self, code: i32) {
        self.inner.lock().unwrap().report_exit(ExitInfo::code(code));
    }

    /// Close the output streams and report an exit with `code`.
    pub fn finish(&self, code: i32) {
        let mut inner = self.inner.lock().unwrap();
        inner.close_output();
        inner.report_exit(ExitInfo::code(code));
    }
}

/// The controller's side: a [`ProcessRef`] over the same shared state.
struct FakeProcessRef {
    inner: Arc<Mutex<ProcessInner>>,
}

impl ProcessRef for FakeProcessRef {
    fn id(&self) -> Option<u32> {
        let inner = self.inner.lock().unwrap();
        if !inner.alive {
            return None;
        }
        Some(inner.reported_pid.unwrap_or(inner.pid))
    }

    fn is_alive(&self) -> bool {
        self.inner.lock().unwrap().alive
    }

    fn signal(&mut self, signal: ProcessSignal) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_signals {
            return Err(ScriptvisorError::SignalError(format!(
                "fake delivery of {signal} to {} failed",
                inner.pid
            )));
        }
        inner.signals.push(signal);
        if !inner.alive {
            return Ok(());
        }
        if signal == ProcessSignal::Kill || !inner.ignore_graceful {
            inner.close_output();
            inner.report_exit(ExitInfo::signal(signal.number()));
        }
        Ok(())
    }
}
