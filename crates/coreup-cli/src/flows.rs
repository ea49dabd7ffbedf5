use std::cmp::Ordering;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use coreup_core::{Channel, CpuTier, Platform};
use coreup_installer::{CoreLayout, SystemCommandRunner};
use coreup_lifecycle::{Collaborators, CoreManager, DetachedEngine, EngineControl};
use coreup_remote::{CancelToken, ReqwestTransport};
use semver::Version;
use tracing::debug;

use crate::config::{resolve_prefix, CoreupConfig};
use crate::engine::CommandEngine;
use crate::render::{format_status_lines, render_status_line, OutputStyle, TerminalUi};

/// Per-invocation state shared by every command.
pub struct CliContext {
    pub layout: CoreLayout,
    pub config: CoreupConfig,
    pub style: OutputStyle,
}

impl CliContext {
    pub fn load(prefix: Option<&Path>, style: OutputStyle) -> Result<Self> {
        let layout = CoreLayout::new(resolve_prefix(prefix)?);
        let config = CoreupConfig::load(&layout.config_path())?;
        Ok(Self {
            layout,
            config,
            style,
        })
    }

    pub fn channel(&self, requested: Option<Channel>) -> Channel {
        requested.unwrap_or_else(|| self.config.active_channel())
    }

    pub fn build_manager(&self, assume_yes: bool) -> Result<CoreManager> {
        let engine: Arc<dyn EngineControl> = match &self.config.engine {
            Some(commands) => Arc::new(CommandEngine::new(commands.clone())),
            None => Arc::new(DetachedEngine),
        };
        let transport = ReqwestTransport::new().context("failed to initialize HTTP client")?;
        let deps = Collaborators {
            transport: Arc::new(transport),
            runner: Arc::new(SystemCommandRunner),
            engine,
            ui: Arc::new(TerminalUi::new(self.style, assume_yes)),
        };
        Ok(CoreManager::new(
            self.layout.clone(),
            Platform::current(),
            self.config.active_channel(),
            deps,
        )
        .with_github_token(self.config.github_token()))
    }
}

pub fn run_status_command(ctx: &CliContext, requested: Option<Channel>) -> Result<ExitCode> {
    let manager = ctx.build_manager(false)?;
    let channels = match requested {
        Some(channel) => vec![channel],
        None => Channel::ALL.to_vec(),
    };
    for channel in channels {
        manager.refresh_local_version(channel, false);
        for line in format_status_lines(&manager.status(channel), ctx.style) {
            println!("{line}");
        }
    }
    Ok(ExitCode::SUCCESS)
}

pub fn run_check_command(ctx: &CliContext, channel: Channel) -> Result<ExitCode> {
    let manager = ctx.build_manager(false)?;
    let status = manager.refresh_versions(channel, true);
    for line in format_status_lines(&status, ctx.style) {
        println!("{line}");
    }
    if let Some(hint) = version_hint(&status.state.local_version, &status.state.remote_version) {
        println!("{}", render_status_line(ctx.style, "info", &hint));
    }
    Ok(ExitCode::SUCCESS)
}

pub fn run_install_command(
    ctx: &CliContext,
    channel: Channel,
    cpu_tier: Option<CpuTier>,
    assume_yes: bool,
    restart: bool,
) -> Result<ExitCode> {
    let cpu_tier = match cpu_tier {
        Some(tier) => Some(tier),
        None => ctx.config.cpu_tier()?,
    };
    let manager = ctx.build_manager(assume_yes)?;
    manager.refresh_local_version(channel, false);
    // Prerelease asset names embed the remote version.
    manager.refresh_remote_version(channel, true);

    // Ctrl-C at the risk prompt also lands here; the manager checks the token
    // again before the download starts.
    let cancel = CancelToken::new();
    install_interrupt_handler(&cancel);
    if manager.install(channel, cpu_tier, &cancel).is_err() {
        return Ok(ExitCode::FAILURE);
    }

    let status = manager.status(channel);
    if restart {
        if manager.restart(channel).is_err() {
            return Ok(ExitCode::FAILURE);
        }
    } else if status.restartable {
        println!(
            "{}",
            render_status_line(
                ctx.style,
                "info",
                "engine is still running the previous core; run `coreup restart` to load it"
            )
        );
    }
    Ok(ExitCode::SUCCESS)
}

pub fn run_rollback_command(
    ctx: &CliContext,
    channel: Channel,
    assume_yes: bool,
) -> Result<ExitCode> {
    let manager = ctx.build_manager(assume_yes)?;
    manager.refresh_local_version(channel, false);
    Ok(exit_code(manager.rollback(channel).is_ok()))
}

pub fn run_restart_command(ctx: &CliContext, channel: Channel) -> Result<ExitCode> {
    let manager = ctx.build_manager(false)?;
    match manager.restart(channel) {
        Ok(true) => Ok(ExitCode::SUCCESS),
        Ok(false) => {
            println!(
                "{}",
                render_status_line(ctx.style, "warn", "engine is not running; nothing to restart")
            );
            Ok(ExitCode::SUCCESS)
        }
        Err(_) => Ok(ExitCode::FAILURE),
    }
}

pub fn run_grant_command(ctx: &CliContext, channel: Channel) -> Result<ExitCode> {
    let manager = ctx.build_manager(false)?;
    manager.refresh_local_version(channel, true);
    if !manager.status(channel).grantable {
        eprintln!(
            "{}",
            render_status_line(
                ctx.style,
                "err",
                &format!("{channel} core cannot be granted on this platform or is not installed")
            )
        );
        return Ok(ExitCode::FAILURE);
    }
    match manager.grant_permission(channel) {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(err) => {
            eprintln!("{}", render_status_line(ctx.style, "err", &err.to_string()));
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Switches the configured active channel. Download-completed flags live in
/// process memory only, so the next invocation starts with them cleared.
pub fn run_use_command(ctx: &mut CliContext, channel: Channel) -> Result<ExitCode> {
    let previous = ctx.config.active_channel();
    ctx.config.active_channel = Some(channel);
    ctx.config.save(&ctx.layout.config_path())?;
    debug!(from = %previous, to = %channel, "active channel saved");

    let message = if previous == channel {
        format!("{channel} is already the active channel")
    } else {
        format!("active channel: {previous} -> {channel}")
    };
    println!("{}", render_status_line(ctx.style, "ok", &message));
    Ok(ExitCode::SUCCESS)
}

pub fn run_where_command(ctx: &CliContext, channel: Channel) -> Result<ExitCode> {
    let spec = channel.spec();
    let binary = ctx.layout.installed_binary(&spec, Platform::current());
    for line in [
        format!("release: {}", spec.release_page),
        format!("working_dir: {}", ctx.layout.working_dir().display()),
        format!("active: {}", binary.active().display()),
        format!("backup: {}", binary.backup().display()),
        format!("cache: {}", ctx.layout.cache_dir().display()),
    ] {
        println!("{line}");
    }
    Ok(ExitCode::SUCCESS)
}

/// Describes how `remote` relates to `local` when both are semantic
/// versions. Informational only; updatability is a plain string comparison.
pub fn version_hint(local: &str, remote: &str) -> Option<String> {
    let local_version = parse_semver(local)?;
    let remote_version = parse_semver(remote)?;
    match remote_version.cmp(&local_version) {
        Ordering::Greater => Some(format!("upgrade available: {local} -> {remote}")),
        Ordering::Less => Some(format!(
            "remote {remote} is older than installed {local}; installing would downgrade"
        )),
        Ordering::Equal => None,
    }
}

fn parse_semver(raw: &str) -> Option<Version> {
    let trimmed = raw.trim();
    Version::parse(trimmed.strip_prefix('v').unwrap_or(trimmed)).ok()
}

fn install_interrupt_handler(cancel: &CancelToken) {
    let token = cancel.clone();
    if let Err(err) = ctrlc::set_handler(move || token.cancel()) {
        debug!(%err, "could not install Ctrl-C handler");
    }
}

fn exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
