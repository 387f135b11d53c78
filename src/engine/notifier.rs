// src/engine/notifier.rs

//! Delivery of line and exit events to caller-supplied observers.
//!
//! Observers are plain closures. A panicking observer is caught per
//! invocation and logged; it never unwinds into the controller.

use std::any::Any;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};

use tracing::error;

use crate::types::{ExitInfo, StreamKind};

pub type LineCallback = Box<dyn FnMut(&str) + Send>;
pub type ExitCallback = Box<dyn FnMut(ExitInfo) + Send>;

#[derive(Default)]
pub struct Notifier {
    on_stdout_line: Option<LineCallback>,
    on_stderr_line: Option<LineCallback>,
    on_exit: Option<ExitCallback>,
}

impl fmt::Debug for Notifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier")
            .field("on_stdout_line", &self.on_stdout_line.is_some())
            .field("on_stderr_line", &self.on_stderr_line.is_some())
            .field("on_exit", &self.on_exit.is_some())
            .finish()
    }
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_on_stdout_line(&mut self, cb: Option<LineCallback>) {
        self.on_stdout_line = cb;
    }

    pub fn set_on_stderr_line(&mut self, cb: Option<LineCallback>) {
        self.on_stderr_line = cb;
    }

    pub fn set_on_exit(&mut self, cb: Option<ExitCallback>) {
        self.on_exit = cb;
    }

    /// Route a complete line to the observer for its stream.
    pub fn line(&mut self, stream: StreamKind, line: &str) {
        let cb = match stream {
            StreamKind::Stdout => self.on_stdout_line.as_mut(),
            StreamKind::Stderr => self.on_stderr_line.as_mut(),
        };
        if let Some(cb) = cb {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| cb(line))) {
                error!(
                    %stream,
                    panic = %panic_message(payload.as_ref()),
                    "line callback panicked; continuing"
                );
            }
        }
    }

    /// Notify the exit observer, if one is installed.
    pub fn exit(&mut self, info: ExitInfo) {
        let Some(cb) = self.on_exit.as_mut() else {
            return;
        };
        if let Err(payload) = catch_unwind(AssertUnwindSafe(|| cb(info))) {
            error!(
                panic = %panic_message(payload.as_ref()),
                "exit callback panicked; continuing"
            );
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn routes_lines_by_stream() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut notifier = Notifier::new();

        let out = Arc::clone(&seen);
        notifier.set_on_stdout_line(Some(Box::new(move |l: &str| {
            out.lock().unwrap().push(format!("out:{l}"))
        })));
        let err = Arc::clone(&seen);
        notifier.set_on_stderr_line(Some(Box::new(move |l: &str| {
            err.lock().unwrap().push(format!("err:{l}"))
        })));

        notifier.line(StreamKind::Stdout, "a");
        notifier.line(StreamKind::Stderr, "b");

        assert_eq!(*seen.lock().unwrap(), vec!["out:a", "err:b"]);
    }

    #[test]
    fn panicking_callback_is_isolated() {
        let calls = Arc::new(Mutex::new(0));
        let mut notifier = Notifier::new();

        let counter = Arc::clone(&calls);
        notifier.set_on_stdout_line(Some(Box::new(move |line: &str| {
            *counter.lock().unwrap() += 1;
            if line == "boom" {
                panic!("observer failed");
            }
        })));

        notifier.line(StreamKind::Stdout, "boom");
        notifier.line(StreamKind::Stdout, "fine");

        assert_eq!(*calls.lock().unwrap(), 2);
    }

    #[test]
    fn missing_observers_are_skipped() {
        let mut notifier = Notifier::new();
        notifier.line(StreamKind::Stderr, "nobody listens");
        notifier.exit(ExitInfo::code(0));
    }
}
