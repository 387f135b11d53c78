#![allow(dead_code)]

pub use scriptvisor_test_utils::*;

use std::sync::Arc;

use scriptvisor::engine::{ControllerOptions, ProcessController};
use scriptvisor::fs::mock::MockFileSystem;

pub const SCRIPT: &str = "scripts/worker.lua";

/// A controller wired to fakes, with a recorder attached.
pub struct Harness {
    pub controller: ProcessController<FakeSpawner, FakeTimer>,
    pub spawner: FakeSpawner,
    pub timer: FakeTimer,
    pub fs: MockFileSystem,
    pub recorder: Recorder,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_options(ControllerOptions::default())
    }

    pub fn with_options(options: ControllerOptions) -> Self {
        let fs = MockFileSystem::new();
        fs.add_file(SCRIPT, "print('working')");
        let spawner = FakeSpawner::new();
        let timer = FakeTimer::new();
        let recorder = Recorder::new();

        let mut controller = ProcessController::with_backends(
            SCRIPT,
            options,
            spawner.clone(),
            timer.clone(),
            Arc::new(fs.clone()),
        );
        recorder.attach(&mut controller);

        Self {
            controller,
            spawner,
            timer,
            fs,
            recorder,
        }
    }

    /// Another controller sharing this harness' fakes, for a different path.
    pub fn controller_for(&self, path: &str) -> ProcessController<FakeSpawner, FakeTimer> {
        ProcessController::with_backends(
            path,
            ControllerOptions::default(),
            self.spawner.clone(),
            self.timer.clone(),
            Arc::new(self.fs.clone()),
        )
    }
}

/// Yield to other tasks until `cond` holds, failing after 5 seconds.
pub async fn eventually<F: FnMut() -> bool>(mut cond: F) {
    with_timeout(async move {
        while !cond() {
            tokio::task::yield_now().await;
        }
    })
    .await;
}
