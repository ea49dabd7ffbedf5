use super::*;

use std::cell::Cell;
use std::fs;
use std::path::Path;

use clap::error::ErrorKind;
use coreup_core::{Channel, CoreError, CoreResult, CpuTier, Os};
use coreup_installer::InstallStage;
use coreup_lifecycle::{ChannelStatus, EngineControl, LifecycleState};

use crate::config::{resolve_github_token, resolve_prefix, CoreupConfig, EngineCommands};
use crate::engine::CommandEngine;
use crate::flows::version_hint;
use crate::render::{format_status_lines, parse_confirmation};

fn sample_status() -> ChannelStatus {
    let state = LifecycleState {
        local_version: "v1.18.0".to_string(),
        version_detail: "Mihomo Meta v1.18.0 linux amd64".to_string(),
        remote_version: "v1.19.0".to_string(),
        backup_exists: true,
        stage: InstallStage::Idle,
        ..LifecycleState::default()
    };
    ChannelStatus::derive(Channel::Stable, state, false, Channel::Stable, Os::Linux)
}

#[test]
fn cli_parses_install_flags() {
    let cli = Cli::try_parse_from([
        "coreup", "--channel", "alpha", "install", "--cpu-tier", "v3", "--yes", "--restart",
    ])
    .expect("must parse");

    assert_eq!(cli.channel, Some(Channel::Alpha));
    match cli.command {
        Commands::Install {
            cpu_tier,
            yes,
            restart,
        } => {
            assert_eq!(cpu_tier, Some(CpuTier::V3));
            assert!(yes);
            assert!(restart);
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn cli_accepts_global_flags_after_subcommand() {
    let cli = Cli::try_parse_from(["coreup", "check", "--channel", "main", "--prefix", "/tmp/x"])
        .expect("must parse");
    assert_eq!(cli.channel, Some(Channel::Stable));
    assert_eq!(cli.prefix, Some(PathBuf::from("/tmp/x")));
    assert!(matches!(cli.command, Commands::Check));
}

#[test]
fn cli_rejects_unknown_channel() {
    let err = Cli::try_parse_from(["coreup", "use", "nightly"]).expect_err("must reject");
    assert_eq!(err.kind(), ErrorKind::ValueValidation);
}

#[test]
fn cli_rejects_unknown_cpu_tier() {
    let err =
        Cli::try_parse_from(["coreup", "install", "--cpu-tier", "v4"]).expect_err("must reject");
    assert_eq!(err.kind(), ErrorKind::ValueValidation);
}

#[test]
fn config_defaults_when_file_missing() {
    let dir = tempfile::tempdir().expect("must create temp dir");
    let config = CoreupConfig::load(&dir.path().join("config.toml")).expect("must load");
    assert_eq!(config, CoreupConfig::default());
    assert_eq!(config.active_channel(), Channel::Stable);
    assert_eq!(config.cpu_tier().expect("tier"), None);
}

#[test]
fn config_parses_engine_commands_and_tier() {
    let dir = tempfile::tempdir().expect("must create temp dir");
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        r#"
active_channel = "smart"
cpu_tier = "v2"

[engine]
status = ["systemctl", "--user", "is-active", "mihomo"]
stop = ["systemctl", "--user", "stop", "mihomo"]
start = ["systemctl", "--user", "start", "mihomo"]
"#,
    )
    .expect("must write config");

    let config = CoreupConfig::load(&path).expect("must load");
    assert_eq!(config.active_channel(), Channel::Smart);
    assert_eq!(config.cpu_tier().expect("tier"), Some(CpuTier::V2));
    let engine = config.engine.expect("engine section");
    assert_eq!(engine.stop[2], "stop");
}

#[test]
fn config_save_preserves_fields_and_switches_channel() {
    let dir = tempfile::tempdir().expect("must create temp dir");
    let path = dir.path().join("nested").join("config.toml");
    let mut config = CoreupConfig {
        github_token: Some("ghp_abc".to_string()),
        ..CoreupConfig::default()
    };
    config.active_channel = Some(Channel::Alpha);
    config.save(&path).expect("must save");

    let loaded = CoreupConfig::load(&path).expect("must load");
    assert_eq!(loaded.active_channel(), Channel::Alpha);
    assert_eq!(loaded.github_token.as_deref(), Some("ghp_abc"));
    assert!(!fs::read_to_string(&path).expect("raw").contains("engine"));
}

#[test]
fn config_rejects_bad_tier_and_bad_toml() {
    let config = CoreupConfig {
        cpu_tier: Some("v9".to_string()),
        ..CoreupConfig::default()
    };
    let err = config.cpu_tier().expect_err("must reject");
    assert!(err.to_string().contains("v9"));

    let dir = tempfile::tempdir().expect("must create temp dir");
    let path = dir.path().join("config.toml");
    fs::write(&path, "active_channel = [").expect("must write");
    let err = CoreupConfig::load(&path).expect_err("must fail");
    assert!(format!("{err:#}").contains("failed to parse config"));
}

#[test]
fn github_token_prefers_config_then_env() {
    assert_eq!(
        resolve_github_token(Some("cfg"), Some("env".to_string())).as_deref(),
        Some("cfg")
    );
    assert_eq!(
        resolve_github_token(Some("  "), Some("env".to_string())).as_deref(),
        Some("env")
    );
    assert_eq!(resolve_github_token(None, Some(" ".to_string())), None);
    assert_eq!(resolve_github_token(None, None), None);
}

#[test]
fn explicit_prefix_wins() {
    let prefix = resolve_prefix(Some(Path::new("/opt/coreup"))).expect("must resolve");
    assert_eq!(prefix, PathBuf::from("/opt/coreup"));
}

#[test]
fn version_hint_detects_upgrade_and_downgrade() {
    assert_eq!(
        version_hint("v1.18.0", "v1.19.0").as_deref(),
        Some("upgrade available: v1.18.0 -> v1.19.0")
    );
    assert!(version_hint("v1.19.0", "v1.18.5")
        .expect("downgrade hint")
        .contains("downgrade"));
    assert_eq!(version_hint("v1.19.0", "v1.19.0"), None);
    assert_eq!(version_hint("alpha-1a2b3c", "alpha-4d5e6f"), None);
    assert_eq!(version_hint("", "v1.19.0"), None);
}

#[test]
fn plain_status_is_single_key_value_line() {
    let lines = format_status_lines(&sample_status(), OutputStyle::Plain);
    assert_eq!(
        lines,
        vec![
            "channel=stable active=true local=v1.18.0 remote=v1.19.0 updatable=true restartable=false rollbackable=true grantable=true"
                .to_string()
        ]
    );
}

#[test]
fn rich_status_marks_active_channel_and_missing_versions() {
    let lines = format_status_lines(&sample_status(), OutputStyle::Rich);
    assert!(lines[0].contains("== stable (active) =="));
    assert!(lines.iter().any(|line| line.contains("detail:")));

    let empty = ChannelStatus::derive(
        Channel::Alpha,
        LifecycleState::default(),
        false,
        Channel::Stable,
        Os::Windows,
    );
    let lines = format_status_lines(&empty, OutputStyle::Rich);
    assert!(lines[0].contains("== alpha =="));
    assert!(lines.iter().any(|line| line.ends_with("not installed")));
    assert!(lines.iter().any(|line| line.ends_with("unknown")));
}

#[test]
fn render_status_line_badges() {
    assert_eq!(
        render_status_line(OutputStyle::Plain, "ok", "stable core updated"),
        "stable core updated"
    );
    assert_eq!(
        render_status_line(OutputStyle::Rich, "ok", "stable core updated"),
        "[OK] stable core updated"
    );
    assert_eq!(
        render_status_line(OutputStyle::Rich, "err", "download failed"),
        "[ERR] download failed"
    );
    assert_eq!(
        render_status_line(OutputStyle::Rich, "info", "cancelled"),
        "[..] cancelled"
    );
}

#[test]
fn confirmation_accepts_only_yes() {
    assert!(parse_confirmation("y\n"));
    assert!(parse_confirmation(" YES "));
    assert!(!parse_confirmation("\n"));
    assert!(!parse_confirmation("no"));
}

#[test]
fn engine_without_commands_is_not_running_and_cannot_restart() {
    let engine = CommandEngine::new(EngineCommands::default());
    assert!(!engine.is_running());

    let swapped = Cell::new(false);
    let mut hook = || -> CoreResult<()> {
        swapped.set(true);
        Ok(())
    };
    let err = engine.restart(Some(&mut hook)).expect_err("no stop command");
    assert!(matches!(err, CoreError::Execution { .. }));
    assert!(!swapped.get());
}

#[cfg(unix)]
#[test]
fn engine_restart_runs_hook_between_stop_and_start() {
    let dir = tempfile::tempdir().expect("must create temp dir");
    let marker = dir.path().join("started");
    let engine = CommandEngine::new(EngineCommands {
        status: vec!["true".to_string()],
        stop: vec!["true".to_string()],
        start: vec![
            "touch".to_string(),
            marker.display().to_string(),
        ],
    });
    assert!(engine.is_running());

    let swapped = Cell::new(false);
    let mut hook = || -> CoreResult<()> {
        swapped.set(true);
        Err(CoreError::Rollback("swap failed".to_string()))
    };
    let err = engine.restart(Some(&mut hook)).expect_err("swap error wins");
    assert!(matches!(err, CoreError::Rollback(_)));
    assert!(swapped.get());
    assert!(marker.exists(), "engine must be started again after a failed swap");
}

#[cfg(unix)]
#[test]
fn engine_status_failure_means_not_running() {
    let engine = CommandEngine::new(EngineCommands {
        status: vec!["false".to_string()],
        ..EngineCommands::default()
    });
    assert!(!engine.is_running());
}

#[test]
fn use_command_persists_active_channel() {
    let dir = tempfile::tempdir().expect("must create temp dir");
    let mut ctx = CliContext::load(Some(dir.path()), OutputStyle::Plain).expect("must load");
    assert_eq!(ctx.channel(None), Channel::Stable);

    run_use_command(&mut ctx, Channel::Smart).expect("must switch");

    let reloaded = CliContext::load(Some(dir.path()), OutputStyle::Plain).expect("must reload");
    assert_eq!(reloaded.channel(None), Channel::Smart);
    assert_eq!(reloaded.channel(Some(Channel::Alpha)), Channel::Alpha);
}
