// src/engine/runtime.rs

use std::fmt;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::errors::Result;
use crate::exec::{Spawner, Timer};

use super::controller::ProcessController;
use super::{RuntimeCommand, RuntimeOptions};

/// Drives one [`ProcessController`] in response to [`RuntimeCommand`]s and
/// the controller's own events.
///
/// The controller holds all lifecycle semantics; this struct only does the
/// async plumbing: waiting on the command channel and the controller's event
/// queue, and deciding when there is nothing left to supervise.
pub struct ScriptRuntime<S: Spawner, T: Timer> {
    controller: ProcessController<S, T>,
    command_rx: mpsc::Receiver<RuntimeCommand>,
    options: RuntimeOptions,
}

impl<S: Spawner, T: Timer> fmt::Debug for ScriptRuntime<S, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptRuntime")
            .field("controller", &self.controller)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<S: Spawner, T: Timer> ScriptRuntime<S, T> {
    pub fn new(
        controller: ProcessController<S, T>,
        command_rx: mpsc::Receiver<RuntimeCommand>,
        options: RuntimeOptions,
    ) -> Self {
        Self {
            controller,
            command_rx,
            options,
        }
    }

    /// Main loop.
    ///
    /// - Starts the script.
    /// - Applies controller events and commands as they arrive.
    /// - On `Shutdown` (or a closed command channel) stops the script and
    ///   keeps going until its exit has been reported.
    ///
    /// Returns the controller so callers can inspect the final state.
    pub async fn run(mut self) -> Result<ProcessController<S, T>> {
        let script = self.controller.path().display().to_string();
        info!(%script, "script runtime started");

        self.controller.start();
        let mut shutting_down = false;

        loop {
            if self.is_settled(shutting_down) {
                break;
            }

            tokio::select! {
                command = self.command_rx.recv(), if !shutting_down => {
                    match command {
                        Some(command) => {
                            debug!(%script, ?command, "runtime received command");
                            shutting_down = self.execute_command(command);
                        }
                        None => {
                            info!(%script, "command channel closed; shutting down");
                            self.controller.stop();
                            shutting_down = true;
                        }
                    }
                }
                () = self.controller.turn() => {}
            }
        }

        info!(%script, state = %self.controller.state(), "script runtime exiting");
        Ok(self.controller)
    }

    /// Execute a single command. Returns true when shutdown was requested.
    fn execute_command(&mut self, command: RuntimeCommand) -> bool {
        match command {
            RuntimeCommand::Start => {
                self.controller.start();
                false
            }
            RuntimeCommand::Stop => {
                self.controller.stop();
                false
            }
            RuntimeCommand::Shutdown => {
                self.controller.stop();
                true
            }
        }
    }

    fn is_settled(&self, shutting_down: bool) -> bool {
        let idle = !self.controller.running()
            && !self.controller.has_live_process()
            && (self.controller.exit_notified() || self.controller.pid().is_none());
        idle && (shutting_down || self.options.exit_when_idle)
    }
}
