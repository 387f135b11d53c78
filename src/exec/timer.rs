// src/exec/timer.rs

//! Fire-once delayed events.

use std::time::Duration;

use tokio::time::sleep;
use tracing::debug;

use crate::engine::{ControllerEvent, EventSender};

/// Schedules a single event to be posted after a delay.
///
/// There is no cancellation: handlers must tolerate the event arriving after
/// it stopped being relevant.
pub trait Timer: Send {
    fn schedule(&mut self, delay: Duration, event: ControllerEvent, events: EventSender);
}

/// Timer backed by `tokio::time::sleep` in a detached task.
#[derive(Debug, Clone, Default)]
pub struct TokioTimer;

impl TokioTimer {
    pub fn new() -> Self {
        Self
    }
}

impl Timer for TokioTimer {
    fn schedule(&mut self, delay: Duration, event: ControllerEvent, events: EventSender) {
        tokio::spawn(async move {
            sleep(delay).await;
            if events.send(event).is_err() {
                debug!("controller gone before timer fired");
            }
        });
    }
}
