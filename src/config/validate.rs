// src/config/validate.rs

use std::time::Duration;

use globset::Glob;

use crate::config::duration::parse_duration;
use crate::config::model::{ConfigFile, RawConfigFile};
use crate::engine::ControllerOptions;
use crate::errors::{Result, ScriptvisorError};
use crate::types::ProcessSignal;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = ScriptvisorError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        let options = validate_supervision(&raw)?;
        let run_for = validate_run_for(&raw)?;
        validate_patterns(&raw)?;
        Ok(ConfigFile::new_unchecked(options, run_for, raw.scripts))
    }
}

fn validate_supervision(cfg: &RawConfigFile) -> Result<ControllerOptions> {
    let section = &cfg.config;

    if section.interpreter.trim().is_empty() {
        return Err(ScriptvisorError::ConfigError(
            "[config].interpreter must not be empty".to_string(),
        ));
    }

    let grace_delay = duration_field("grace_delay", &section.grace_delay)?;
    if grace_delay.is_zero() {
        return Err(ScriptvisorError::ConfigError(
            "[config].grace_delay must be greater than zero".to_string(),
        ));
    }

    let drain_timeout = duration_field("drain_timeout", &section.drain_timeout)?;

    if section.stop_signal == ProcessSignal::Kill {
        return Err(ScriptvisorError::ConfigError(
            "[config].stop_signal must be a graceful signal; kill is reserved for escalation"
                .to_string(),
        ));
    }

    Ok(ControllerOptions {
        interpreter: section.interpreter.trim().to_string(),
        grace_delay,
        drain_timeout,
        stop_signal: section.stop_signal,
    })
}

fn validate_run_for(cfg: &RawConfigFile) -> Result<Option<Duration>> {
    cfg.config
        .run_for
        .as_deref()
        .map(|s| duration_field("run_for", s))
        .transpose()
}

fn validate_patterns(cfg: &RawConfigFile) -> Result<()> {
    for pat in cfg.scripts.include.iter().chain(cfg.scripts.exclude.iter()) {
        Glob::new(pat).map_err(|e| {
            ScriptvisorError::ConfigError(format!("[scripts] invalid glob pattern '{pat}': {e}"))
        })?;
    }
    if cfg.scripts.dir.is_some() && cfg.scripts.include.is_empty() {
        return Err(ScriptvisorError::ConfigError(
            "[scripts].include must not be empty when [scripts].dir is set".to_string(),
        ));
    }
    Ok(())
}

fn duration_field(name: &str, value: &str) -> Result<Duration> {
    parse_duration(value)
        .map_err(|e| ScriptvisorError::ConfigError(format!("[config].{name}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_src: &str) -> Result<ConfigFile> {
        let raw: RawConfigFile = toml::from_str(toml_src)?;
        ConfigFile::try_from(raw)
    }

    #[test]
    fn empty_file_uses_defaults() {
        let cfg = parse("").unwrap();
        let opts = cfg.controller_options();
        assert_eq!(opts.interpreter, "lua");
        assert_eq!(opts.grace_delay, Duration::from_millis(500));
        assert_eq!(opts.drain_timeout, Duration::from_millis(100));
        assert_eq!(opts.stop_signal, ProcessSignal::Terminate);
        assert_eq!(cfg.run_for(), None);
        assert_eq!(cfg.scripts().include, vec!["*.lua".to_string()]);
    }

    #[test]
    fn full_file_is_typed() {
        let cfg = parse(
            r#"
[config]
interpreter = "luajit"
grace_delay = "2s"
drain_timeout = "0ms"
stop_signal = "interrupt"
run_for = "5s"

[scripts]
dir = "scripts"
include = ["**/*.lua"]
exclude = ["**/skip_*.lua"]
paths = ["./example.lua"]
"#,
        )
        .unwrap();

        let opts = cfg.controller_options();
        assert_eq!(opts.interpreter, "luajit");
        assert_eq!(opts.grace_delay, Duration::from_secs(2));
        assert_eq!(opts.drain_timeout, Duration::ZERO);
        assert_eq!(opts.stop_signal, ProcessSignal::Interrupt);
        assert_eq!(cfg.run_for(), Some(Duration::from_secs(5)));
        assert_eq!(cfg.scripts().paths.len(), 1);
    }

    #[test]
    fn zero_grace_delay_is_rejected() {
        let err = parse("[config]\ngrace_delay = \"0s\"\n").unwrap_err();
        assert!(matches!(err, ScriptvisorError::ConfigError(msg) if msg.contains("grace_delay")));
    }

    #[test]
    fn kill_as_stop_signal_is_rejected() {
        let err = parse("[config]\nstop_signal = \"kill\"\n").unwrap_err();
        assert!(matches!(err, ScriptvisorError::ConfigError(msg) if msg.contains("stop_signal")));
    }

    #[test]
    fn bad_duration_is_reported_with_field_name() {
        let err = parse("[config]\nrun_for = \"soon\"\n").unwrap_err();
        assert!(matches!(err, ScriptvisorError::ConfigError(msg) if msg.contains("run_for")));
    }

    #[test]
    fn bad_glob_is_rejected() {
        let err = parse("[scripts]\ninclude = [\"[\"]\n").unwrap_err();
        assert!(matches!(err, ScriptvisorError::ConfigError(msg) if msg.contains("glob")));
    }

    #[test]
    fn unknown_signal_is_a_toml_error() {
        let err = parse("[config]\nstop_signal = \"usr1\"\n").unwrap_err();
        assert!(matches!(err, ScriptvisorError::TomlError(_)));
    }
}
