// tests/config_loading.rs

use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use scriptvisor::config::{load_and_validate, load_from_path};
use scriptvisor::discovery::resolve_scripts;
use scriptvisor::errors::ScriptvisorError;
use scriptvisor::fs::RealFileSystem;
use scriptvisor::types::ProcessSignal;
use tempfile::{NamedTempFile, TempDir};

fn config_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

#[test]
fn full_config_is_parsed_and_typed() {
    let file = config_file(
        r#"
[config]
interpreter = "luajit"
grace_delay = "2s"
drain_timeout = "50ms"
stop_signal = "interrupt"
run_for = "1m"

[scripts]
dir = "scripts"
include = ["**/*.lua"]
exclude = ["**/skip_*"]
paths = ["extra/boot.lua"]
"#,
    );

    let cfg = load_and_validate(file.path()).unwrap();
    let opts = cfg.controller_options();

    assert_eq!(opts.interpreter, "luajit");
    assert_eq!(opts.grace_delay, Duration::from_secs(2));
    assert_eq!(opts.drain_timeout, Duration::from_millis(50));
    assert_eq!(opts.stop_signal, ProcessSignal::Interrupt);
    assert_eq!(cfg.run_for(), Some(Duration::from_secs(60)));
    assert_eq!(cfg.scripts().dir, Some(PathBuf::from("scripts")));
    assert_eq!(cfg.scripts().paths, vec![PathBuf::from("extra/boot.lua")]);
}

#[test]
fn empty_config_uses_defaults() {
    let file = config_file("");

    let cfg = load_and_validate(file.path()).unwrap();
    let opts = cfg.controller_options();

    assert_eq!(opts.interpreter, "lua");
    assert_eq!(opts.grace_delay, Duration::from_millis(500));
    assert_eq!(opts.drain_timeout, Duration::from_millis(100));
    assert_eq!(opts.stop_signal, ProcessSignal::Terminate);
    assert_eq!(cfg.run_for(), None);
    assert_eq!(cfg.scripts().include, vec!["*.lua".to_string()]);
}

#[test]
fn invalid_duration_returns_config_error() {
    let file = config_file("[config]\ngrace_delay = \"soon\"\n");

    match load_and_validate(file.path()) {
        Err(ScriptvisorError::ConfigError(msg)) => assert!(msg.contains("grace_delay")),
        other => panic!("expected ConfigError, got {other:?}"),
    }
}

#[test]
fn kill_is_rejected_as_stop_signal() {
    let file = config_file("[config]\nstop_signal = \"kill\"\n");

    assert!(matches!(
        load_and_validate(file.path()),
        Err(ScriptvisorError::ConfigError(_))
    ));
}

#[test]
fn unknown_stop_signal_is_a_toml_error() {
    let file = config_file("[config]\nstop_signal = \"usr1\"\n");

    assert!(matches!(
        load_from_path(file.path()),
        Err(ScriptvisorError::TomlError(_))
    ));
}

#[test]
fn missing_config_file_is_an_io_error() {
    let dir = TempDir::new().unwrap();

    assert!(matches!(
        load_from_path(dir.path().join("nope.toml")),
        Err(ScriptvisorError::IoError(_))
    ));
}

#[test]
fn scripts_are_discovered_on_disk() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("scripts");
    fs::create_dir_all(root.join("nested")).unwrap();
    fs::write(root.join("b.lua"), "").unwrap();
    fs::write(root.join("a.lua"), "").unwrap();
    fs::write(root.join("nested/c.lua"), "").unwrap();
    fs::write(root.join("notes.txt"), "").unwrap();
    fs::write(root.join("skip_me.lua"), "").unwrap();

    let file = config_file(&format!(
        "[scripts]\ndir = {:?}\ninclude = [\"**/*.lua\"]\nexclude = [\"**/skip_*\"]\n",
        root.display().to_string()
    ));
    let cfg = load_and_validate(file.path()).unwrap();

    let scripts = resolve_scripts(&RealFileSystem, cfg.scripts()).unwrap();
    assert_eq!(
        scripts,
        vec![root.join("a.lua"), root.join("b.lua"), root.join("nested/c.lua")]
    );
}
