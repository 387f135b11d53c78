// src/exec/pipe.rs

//! Unidirectional output pipe between a script process and its controller.
//!
//! An [`OutputPipe`] is allocated empty by the controller, bound to a byte
//! source by the spawner, and then read asynchronously: a background Tokio
//! task forwards every chunk as a [`ControllerEvent::Output`] and finishes
//! with a [`ControllerEvent::StreamClosed`].

use std::fmt;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::engine::{ControllerEvent, EventSender};
use crate::types::{RunId, StreamKind};

const READ_CHUNK_SIZE: usize = 4096;

/// Any async byte source a pipe can be bound to (child stdout/stderr,
/// in-memory duplex streams in tests).
pub type PipeSource = Box<dyn AsyncRead + Send + Unpin>;

pub struct OutputPipe {
    kind: StreamKind,
    source: Option<PipeSource>,
    reader: Option<JoinHandle<()>>,
    closing: bool,
}

impl fmt::Debug for OutputPipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputPipe")
            .field("kind", &self.kind)
            .field("bound", &self.source.is_some())
            .field("reading", &self.reader.is_some())
            .field("closing", &self.closing)
            .finish()
    }
}

impl OutputPipe {
    /// Allocate an unbound pipe for the given stream.
    pub fn new(kind: StreamKind) -> Self {
        Self {
            kind,
            source: None,
            reader: None,
            closing: false,
        }
    }

    pub fn kind(&self) -> StreamKind {
        self.kind
    }

    /// Bind the pipe to the byte source produced by the spawned process.
    pub fn attach(&mut self, source: PipeSource) {
        self.source = Some(source);
    }

    pub fn is_bound(&self) -> bool {
        self.source.is_some() || self.reader.is_some()
    }

    /// Begin asynchronous reads. Every chunk is posted to `events` tagged
    /// with `run`. Returns false if the pipe has no source or is closing.
    pub fn read_start(&mut self, run: RunId, events: EventSender) -> bool {
        if self.closing {
            return false;
        }
        let Some(mut source) = self.source.take() else {
            return false;
        };

        let stream = self.kind;
        self.reader = Some(tokio::spawn(async move {
            let mut buf = vec![0u8; READ_CHUNK_SIZE];
            loop {
                match source.read(&mut buf).await {
                    Ok(0) => break,
                    Ok(n) => {
                        let event = ControllerEvent::Output {
                            run,
                            stream,
                            chunk: buf[..n].to_vec(),
                        };
                        if events.send(event).is_err() {
                            debug!(%stream, run, "controller gone; pipe reader exiting");
                            return;
                        }
                    }
                    Err(err) => {
                        warn!(%stream, run, error = %err, "error reading from pipe");
                        break;
                    }
                }
            }
            let _ = events.send(ControllerEvent::StreamClosed { run, stream });
        }));

        true
    }

    /// Stop reading. Chunks not yet forwarded are dropped.
    pub fn read_stop(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }

    /// Stop reading and release the underlying source.
    pub fn close(&mut self) {
        self.read_stop();
        self.source = None;
        self.closing = true;
    }

    pub fn is_closing(&self) -> bool {
        self.closing
    }
}

impl Drop for OutputPipe {
    fn drop(&mut self) {
        self.read_stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn forwards_chunks_then_close() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut pipe = OutputPipe::new(StreamKind::Stdout);
        pipe.attach(Box::new(std::io::Cursor::new(b"hello\n".to_vec())));

        assert!(pipe.read_start(7, tx));

        let first = rx.recv().await.unwrap();
        assert_eq!(
            first,
            ControllerEvent::Output {
                run: 7,
                stream: StreamKind::Stdout,
                chunk: b"hello\n".to_vec(),
            }
        );
        let second = rx.recv().await.unwrap();
        assert_eq!(
            second,
            ControllerEvent::StreamClosed {
                run: 7,
                stream: StreamKind::Stdout,
            }
        );
    }

    #[tokio::test]
    async fn closed_pipe_cannot_start() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut pipe = OutputPipe::new(StreamKind::Stderr);
        pipe.attach(Box::new(std::io::Cursor::new(Vec::new())));
        pipe.close();

        assert!(pipe.is_closing());
        assert!(!pipe.is_bound());
        assert!(!pipe.read_start(1, tx));
    }

    #[tokio::test]
    async fn unbound_pipe_cannot_start() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut pipe = OutputPipe::new(StreamKind::Stdout);
        assert!(!pipe.read_start(1, tx));
        assert!(!pipe.is_closing());
    }
}
