//! Manually fired replacement for `TokioTimer`.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use scriptvisor::engine::{ControllerEvent, EventSender};
use scriptvisor::exec::Timer;

type Scheduled = (Duration, ControllerEvent, EventSender);

/// Records scheduled events instead of sleeping. Clones share the queue.
#[derive(Debug, Clone, Default)]
pub struct FakeTimer {
    scheduled: Arc<Mutex<Vec<Scheduled>>>,
}

impl FakeTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay and event of everything scheduled but not yet fired.
    pub fn pending(&self) -> Vec<(Duration, ControllerEvent)> {
        self.scheduled
            .lock()
            .unwrap()
            .iter()
            .map(|(delay, event, _)| (*delay, event.clone()))
            .collect()
    }

    /// Post every scheduled event now. Returns how many were fired.
    pub fn fire_all(&self) -> usize {
        let due: Vec<Scheduled> = self.scheduled.lock().unwrap().drain(..).collect();
        let count = due.len();
        for (_, event, events) in due {
            let _ = events.send(event);
        }
        count
    }
}

impl Timer for FakeTimer {
    fn schedule(&mut self, delay: Duration, event: ControllerEvent, events: EventSender) {
        self.scheduled.lock().unwrap().push((delay, event, events));
    }
}
