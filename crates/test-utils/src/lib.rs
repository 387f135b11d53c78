pub mod fake_spawner;
pub mod fake_timer;
pub mod log_capture;

use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use scriptvisor::engine::ProcessController;
use scriptvisor::exec::{Spawner, Timer};
use scriptvisor::types::ExitInfo;
use tracing_subscriber::{EnvFilter, fmt};

pub use fake_spawner::{FakeProcess, FakeSpawner, RecordedSpawn};
pub use fake_timer::FakeTimer;
pub use log_capture::LogCapture;

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// - Uses `with_test_writer()`, so logs are captured per-test.
/// - The Rust test harness only prints captured output for **failing** tests
///   (unless you run with `-- --nocapture`).
///
/// Enable levels with e.g.:
/// `RUST_LOG=debug cargo test`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer() // print only for failing tests unless --nocapture
            .with_target(true)
            .init();
    });
}

/// Run a future with a 5-second timeout.
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(Duration::from_secs(5), f)
        .await
        .expect("Test timed out after 5 seconds")
}

/// Apply controller events until `done` holds, failing after 5 seconds.
pub async fn pump_until<S, T, F>(controller: &mut ProcessController<S, T>, mut done: F)
where
    S: Spawner,
    T: Timer,
    F: FnMut(&ProcessController<S, T>) -> bool,
{
    with_timeout(async move {
        while !done(&*controller) {
            controller.turn().await;
        }
    })
    .await;
}

/// Collects everything a controller reports to its observers.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    stdout: Arc<Mutex<Vec<String>>>,
    stderr: Arc<Mutex<Vec<String>>>,
    exits: Arc<Mutex<Vec<ExitInfo>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install line and exit observers on `controller` that record into `self`.
    pub fn attach<S: Spawner, T: Timer>(&self, controller: &mut ProcessController<S, T>) {
        let stdout = Arc::clone(&self.stdout);
        controller.on_stdout_line(move |line| stdout.lock().unwrap().push(line.to_string()));

        let stderr = Arc::clone(&self.stderr);
        controller.on_stderr_line(move |line| stderr.lock().unwrap().push(line.to_string()));

        let exits = Arc::clone(&self.exits);
        controller.on_exit(move |info| exits.lock().unwrap().push(info));
    }

    pub fn stdout(&self) -> Vec<String> {
        self.stdout.lock().unwrap().clone()
    }

    pub fn stderr(&self) -> Vec<String> {
        self.stderr.lock().unwrap().clone()
    }

    pub fn exits(&self) -> Vec<ExitInfo> {
        self.exits.lock().unwrap().clone()
    }

    pub fn exit_count(&self) -> usize {
        self.exits.lock().unwrap().len()
    }
}
