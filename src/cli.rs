// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `scriptvisor`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "scriptvisor",
    version,
    about = "Run scripts under an interpreter, stream their output and stop them cleanly.",
    long_about = None
)]
pub struct CliArgs {
    /// Scripts to supervise. Directories are scanned for eligible scripts.
    #[arg(value_name = "PATH")]
    pub scripts: Vec<PathBuf>,

    /// Path to the config file (TOML).
    ///
    /// Default: `Scriptvisor.toml` in the current working directory, if it
    /// exists.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Interpreter used to run every script (overrides the config).
    #[arg(long, value_name = "CMD")]
    pub interpreter: Option<String>,

    /// Wait between the stop signal and the kill escalation, e.g. `500ms`.
    #[arg(long, value_name = "DURATION")]
    pub grace_delay: Option<String>,

    /// Stop all scripts after this long, e.g. `5s`. Default: until Ctrl-C.
    #[arg(long, value_name = "DURATION")]
    pub run_for: Option<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `SCRIPTVISOR_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Resolve config and scripts, print them, but don't start anything.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_overrides_and_paths() {
        let args = CliArgs::try_parse_from([
            "scriptvisor",
            "--interpreter",
            "sh",
            "--run-for",
            "5s",
            "--log-level",
            "debug",
            "a.lua",
            "scripts",
        ])
        .unwrap();

        assert_eq!(args.interpreter.as_deref(), Some("sh"));
        assert_eq!(args.run_for.as_deref(), Some("5s"));
        assert!(matches!(args.log_level, Some(LogLevel::Debug)));
        assert_eq!(args.scripts, vec![PathBuf::from("a.lua"), PathBuf::from("scripts")]);
        assert!(!args.dry_run);
    }
}
