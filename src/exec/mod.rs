// src/exec/mod.rs

//! Process execution layer.
//!
//! This module holds the collaborators a controller drives, each behind a
//! small seam so tests can swap in fakes:
//!
//! - [`spawner`] provides the `Spawner` / `ProcessRef` traits and the
//!   `TokioSpawner` used in production.
//! - [`pipe`] owns the asynchronous reading of one output stream.
//! - [`splitter`] turns byte chunks into lines.
//! - [`signal`] delivers signals and checks liveness by pid.
//! - [`timer`] posts delayed events.

pub mod pipe;
pub mod signal;
pub mod spawner;
pub mod splitter;
pub mod timer;

pub use pipe::{OutputPipe, PipeSource};
pub use spawner::{ProcessRef, SpawnRequest, Spawner, TokioSpawner};
pub use splitter::LineSplitter;
pub use timer::{Timer, TokioTimer};
