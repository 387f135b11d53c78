// tests/cli_run.rs

mod common;
use crate::common::{init_tracing, with_timeout};

use std::fs;
use std::path::PathBuf;

use scriptvisor::cli::CliArgs;
use tempfile::TempDir;

fn args(dir: &TempDir, scripts: Vec<PathBuf>) -> CliArgs {
    let config = dir.path().join("Scriptvisor.toml");
    fs::write(&config, "[config]\ninterpreter = \"sh\"\ngrace_delay = \"100ms\"\n").unwrap();
    CliArgs {
        scripts,
        config: Some(config),
        interpreter: None,
        grace_delay: None,
        run_for: None,
        log_level: None,
        dry_run: false,
    }
}

#[tokio::test]
async fn no_scripts_is_an_error() {
    init_tracing();
    let dir = TempDir::new().unwrap();

    let err = scriptvisor::run(args(&dir, Vec::new())).await.unwrap_err();
    assert!(err.to_string().contains("no scripts"));
}

#[tokio::test]
async fn invalid_override_fails_validation() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let mut args = args(&dir, vec![dir.path().join("x.sh")]);
    args.grace_delay = Some("later".to_string());

    assert!(scriptvisor::run(args).await.is_err());
}

#[tokio::test]
async fn dry_run_starts_nothing() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let marker = dir.path().join("ran");
    let script = dir.path().join("touch.sh");
    fs::write(&script, format!("touch {:?}\n", marker.display().to_string())).unwrap();

    let mut args = args(&dir, vec![script]);
    args.dry_run = true;
    scriptvisor::run(args).await.unwrap();

    assert!(!marker.exists());
}

#[cfg(unix)]
#[tokio::test]
async fn scripts_in_a_directory_run_until_they_exit() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let scripts = dir.path().join("scripts");
    fs::create_dir(&scripts).unwrap();
    for name in ["a", "b"] {
        let marker = dir.path().join(format!("{name}.done"));
        fs::write(
            scripts.join(format!("{name}.lua")),
            format!("echo {name}\ntouch {:?}\n", marker.display().to_string()),
        )
        .unwrap();
    }

    with_timeout(scriptvisor::run(args(&dir, vec![scripts]))).await.unwrap();

    assert!(dir.path().join("a.done").exists());
    assert!(dir.path().join("b.done").exists());
}

#[cfg(unix)]
#[tokio::test]
async fn run_for_stops_long_running_scripts() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let script = dir.path().join("forever.sh");
    fs::write(&script, "while true; do sleep 0.05; done\n").unwrap();

    let mut args = args(&dir, vec![script]);
    args.run_for = Some("300ms".to_string());

    with_timeout(scriptvisor::run(args)).await.unwrap();
}
