// src/errors.rs

//! Crate-wide error aliases and helpers.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScriptvisorError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Script not found or unreadable: {0:?}")]
    ScriptNotFound(PathBuf),

    #[error("Script already running: {0:?}")]
    AlreadyRunning(PathBuf),

    #[error("Failed to spawn '{program}': {source}")]
    SpawnError {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Signal delivery failed: {0}")]
    SignalError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, ScriptvisorError>;
