// src/lib.rs

pub mod cli;
pub mod config;
pub mod discovery;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod types;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::cli::CliArgs;
use crate::config::{ConfigFile, RawConfigFile, default_config_path, load_from_path};
use crate::discovery::resolve_scripts;
use crate::engine::{
    ControllerOptions, ProcessController, RuntimeCommand, RuntimeOptions, ScriptRuntime,
};
use crate::fs::{FileSystem, RealFileSystem};

pub use engine::ControllerEvent;
pub use errors::{Result as ScriptvisorResult, ScriptvisorError};
pub use types::{ExitInfo, ProcessSignal, ProcessState, StreamKind};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading + CLI overrides
/// - script discovery
/// - one controller/runtime per script
/// - `run_for` deadline and Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let fs = RealFileSystem;
    let cfg = build_config(&fs, &args)?;
    let scripts = collect_scripts(&fs, &cfg, &args.scripts)?;

    if scripts.is_empty() {
        bail!("no scripts to supervise; pass script paths or configure [scripts]");
    }

    if args.dry_run {
        print_dry_run(&cfg, &scripts);
        return Ok(());
    }

    let mut runtimes = JoinSet::new();
    let mut command_txs = Vec::with_capacity(scripts.len());

    for script in scripts {
        let (tx, rx) = mpsc::channel::<RuntimeCommand>(8);
        let controller = build_controller(script, cfg.controller_options().clone());
        let runtime = ScriptRuntime::new(controller, rx, RuntimeOptions::default());
        runtimes.spawn(runtime.run());
        command_txs.push(tx);
    }

    // Ctrl-C → graceful shutdown of every script.
    {
        let txs = command_txs.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for Ctrl+C");
                return;
            }
            info!("Ctrl+C received; stopping scripts");
            broadcast(&txs, RuntimeCommand::Shutdown).await;
        });
    }

    if let Some(limit) = cfg.run_for() {
        let txs = command_txs.clone();
        tokio::spawn(async move {
            tokio::time::sleep(limit).await;
            info!(?limit, "run_for elapsed; stopping scripts");
            broadcast(&txs, RuntimeCommand::Shutdown).await;
        });
    }

    while let Some(joined) = runtimes.join_next().await {
        match joined {
            Ok(Ok(controller)) => info!(
                script = %controller.path().display(),
                state = %controller.state(),
                "script supervision finished"
            ),
            Ok(Err(e)) => error!(error = %e, "script runtime failed"),
            Err(e) => error!(error = %e, "script runtime task panicked or was cancelled"),
        }
    }

    // Keep the command senders alive until every runtime returned, so a
    // runtime never mistakes a dropped sender for a shutdown request.
    drop(command_txs);
    Ok(())
}

/// Load the config file (explicit `--config`, else `Scriptvisor.toml` if it
/// exists, else defaults) and apply CLI overrides before validating.
fn build_config(fs: &dyn FileSystem, args: &CliArgs) -> Result<ConfigFile> {
    let mut raw = match &args.config {
        Some(path) => load_from_path(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => {
            let default_path = default_config_path();
            if fs.is_file(&default_path) {
                load_from_path(&default_path)
                    .with_context(|| format!("loading config from {}", default_path.display()))?
            } else {
                RawConfigFile::default()
            }
        }
    };

    if let Some(interpreter) = &args.interpreter {
        raw.config.interpreter = interpreter.clone();
    }
    if let Some(grace) = &args.grace_delay {
        raw.config.grace_delay = grace.clone();
    }
    if let Some(run_for) = &args.run_for {
        raw.config.run_for = Some(run_for.clone());
    }

    ConfigFile::try_from(raw).context("validating configuration")
}

/// Scripts from the config plus positional CLI paths. A positional
/// directory is scanned with the configured include/exclude patterns.
fn collect_scripts(fs: &dyn FileSystem, cfg: &ConfigFile, cli_paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut scripts = resolve_scripts(fs, cfg.scripts())?;

    for path in cli_paths {
        let found = if fs.is_dir(path) {
            let mut section = cfg.scripts().clone();
            section.dir = Some(path.clone());
            section.paths.clear();
            resolve_scripts(fs, &section)?
        } else {
            vec![path.clone()]
        };
        for script in found {
            if !scripts.contains(&script) {
                scripts.push(script);
            }
        }
    }

    Ok(scripts)
}

/// Build a production controller whose output goes to the log.
fn build_controller(script: PathBuf, options: ControllerOptions) -> ProcessController {
    let name = script_name(&script);
    let mut controller = ProcessController::new(script, options);

    let out_name = name.clone();
    controller.on_stdout_line(move |line| {
        info!(target: "script", script = %out_name, "{line}");
    });
    let err_name = name.clone();
    controller.on_stderr_line(move |line| {
        warn!(target: "script", script = %err_name, "{line}");
    });
    controller.on_exit(move |exit| {
        info!(target: "script", script = %name, code = ?exit.code, signal = ?exit.signal, "script finished ({exit})");
    });

    controller
}

fn script_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

async fn broadcast(txs: &[mpsc::Sender<RuntimeCommand>], command: RuntimeCommand) {
    for tx in txs {
        // A runtime that already finished has dropped its receiver.
        let _ = tx.send(command).await;
    }
}

/// Simple dry-run output: print settings and resolved scripts.
fn print_dry_run(cfg: &ConfigFile, scripts: &[PathBuf]) {
    let opts = cfg.controller_options();
    println!("scriptvisor dry-run");
    println!("  config.interpreter = {}", opts.interpreter);
    println!("  config.grace_delay = {:?}", opts.grace_delay);
    println!("  config.drain_timeout = {:?}", opts.drain_timeout);
    println!("  config.stop_signal = {}", opts.stop_signal);
    if let Some(run_for) = cfg.run_for() {
        println!("  config.run_for = {run_for:?}");
    }
    println!();

    println!("scripts ({}):", scripts.len());
    for script in scripts {
        println!("  - {}", script.display());
        println!("      cmd: {} {}", opts.interpreter, script.display());
    }
}
