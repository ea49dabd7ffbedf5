mod config;
mod engine;
mod flows;
mod render;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use coreup_core::{Channel, CpuTier};
use tracing_subscriber::EnvFilter;

use crate::flows::{
    run_check_command, run_grant_command, run_install_command, run_restart_command,
    run_rollback_command, run_status_command, run_use_command, run_where_command, CliContext,
};
use crate::render::{current_output_style, render_status_line, OutputStyle};

const LOG_ENV: &str = "COREUP_LOG";
const DEFAULT_LOG_FILTER: &str = "coreup=warn";

#[derive(Parser, Debug)]
#[command(name = "coreup")]
#[command(
    about = "Keeps the proxy engine core up to date across release channels",
    long_about = None
)]
struct Cli {
    /// Root directory for binaries, cache and config.
    #[arg(long, global = true)]
    prefix: Option<PathBuf>,
    /// Channel to act on; defaults to the configured active channel.
    #[arg(long, global = true, value_parser = parse_channel)]
    channel: Option<Channel>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show installed versions and available actions.
    Status,
    /// Resolve local and remote versions.
    Check,
    /// Download and install the latest release of the channel.
    Install {
        #[arg(long, value_parser = parse_cpu_tier)]
        cpu_tier: Option<CpuTier>,
        /// Answer yes to confirmation prompts.
        #[arg(long)]
        yes: bool,
        /// Restart the engine after a successful install.
        #[arg(long)]
        restart: bool,
    },
    /// Restore the binary that the last install replaced.
    Rollback {
        #[arg(long)]
        yes: bool,
    },
    Restart,
    /// Grant the binary the capabilities needed for TUN mode.
    Grant,
    /// Make a channel the active one.
    Use {
        #[arg(value_name = "CHANNEL", value_parser = parse_channel)]
        target: Channel,
    },
    /// Print release page and file locations.
    Where,
}

fn parse_channel(value: &str) -> Result<Channel, String> {
    Channel::parse(value)
        .ok_or_else(|| format!("unknown channel '{value}' (expected stable, alpha or smart)"))
}

fn parse_cpu_tier(value: &str) -> Result<CpuTier, String> {
    CpuTier::parse(value)
        .ok_or_else(|| format!("unknown cpu tier '{value}' (expected v1, v2 or v3)"))
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run_cli(cli: Cli, style: OutputStyle) -> Result<ExitCode> {
    let mut ctx = CliContext::load(cli.prefix.as_deref(), style)?;
    let channel = ctx.channel(cli.channel);

    match cli.command {
        Commands::Status => run_status_command(&ctx, cli.channel),
        Commands::Check => run_check_command(&ctx, channel),
        Commands::Install {
            cpu_tier,
            yes,
            restart,
        } => run_install_command(&ctx, channel, cpu_tier, yes, restart),
        Commands::Rollback { yes } => run_rollback_command(&ctx, channel, yes),
        Commands::Restart => run_restart_command(&ctx, channel),
        Commands::Grant => run_grant_command(&ctx, channel),
        Commands::Use { target } => run_use_command(&mut ctx, target),
        Commands::Where => run_where_command(&ctx, channel),
    }
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    let style = current_output_style();

    match run_cli(cli, style) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{}", render_status_line(style, "err", &format!("{err:#}")));
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests;
