// src/config/model.rs

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::engine::{ControllerOptions, DEFAULT_INTERPRETER};
use crate::types::ProcessSignal;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [config]
/// interpreter = "lua"
/// grace_delay = "500ms"
///
/// [scripts]
/// dir = "scripts"
/// include = ["*.lua"]
/// paths = ["./example.lua"]
/// ```
///
/// All sections are optional and have reasonable defaults. Durations are
/// kept as strings here and parsed during validation into [`ConfigFile`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    /// Supervision behaviour from `[config]`.
    #[serde(default)]
    pub config: ConfigSection,

    /// Which scripts to supervise, from `[scripts]`.
    #[serde(default)]
    pub scripts: ScriptsSection,
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// Interpreter command; each script path is passed as its only argument.
    #[serde(default = "default_interpreter")]
    pub interpreter: String,

    /// Wait between the graceful signal and the termination check.
    #[serde(default = "default_grace_delay")]
    pub grace_delay: String,

    /// How long output is still read after a script exits on its own.
    #[serde(default = "default_drain_timeout")]
    pub drain_timeout: String,

    /// Graceful signal sent on stop.
    #[serde(default)]
    pub stop_signal: ProcessSignal,

    /// Stop every script after this long. Runs until Ctrl-C when unset.
    #[serde(default)]
    pub run_for: Option<String>,
}

fn default_interpreter() -> String {
    DEFAULT_INTERPRETER.to_string()
}

fn default_grace_delay() -> String {
    "500ms".to_string()
}

fn default_drain_timeout() -> String {
    "100ms".to_string()
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            interpreter: default_interpreter(),
            grace_delay: default_grace_delay(),
            drain_timeout: default_drain_timeout(),
            stop_signal: ProcessSignal::default(),
            run_for: None,
        }
    }
}

/// `[scripts]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ScriptsSection {
    /// Directory scanned for eligible scripts.
    #[serde(default)]
    pub dir: Option<PathBuf>,

    /// Glob patterns (relative to `dir`) a file must match to be eligible.
    #[serde(default = "default_include")]
    pub include: Vec<String>,

    /// Glob patterns that exclude otherwise eligible files.
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Scripts listed explicitly, supervised in addition to `dir`.
    #[serde(default)]
    pub paths: Vec<PathBuf>,
}

fn default_include() -> Vec<String> {
    vec!["*.lua".to_string()]
}

impl Default for ScriptsSection {
    fn default() -> Self {
        Self {
            dir: None,
            include: default_include(),
            exclude: Vec::new(),
            paths: Vec::new(),
        }
    }
}

/// Validated configuration.
///
/// Only obtainable through `ConfigFile::try_from(RawConfigFile)` (see
/// `validate.rs`), so durations are always parsed and sane.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    options: ControllerOptions,
    run_for: Option<Duration>,
    scripts: ScriptsSection,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        options: ControllerOptions,
        run_for: Option<Duration>,
        scripts: ScriptsSection,
    ) -> Self {
        Self {
            options,
            run_for,
            scripts,
        }
    }

    pub fn controller_options(&self) -> &ControllerOptions {
        &self.options
    }

    pub fn run_for(&self) -> Option<Duration> {
        self.run_for
    }

    pub fn scripts(&self) -> &ScriptsSection {
        &self.scripts
    }
}
