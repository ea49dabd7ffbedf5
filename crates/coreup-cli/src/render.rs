use std::io::{self, BufRead, IsTerminal, Write};
use std::sync::Mutex;
use std::time::Duration;

use anstyle::{AnsiColor, Effects, Style};
use coreup_core::Channel;
use coreup_lifecycle::{ChannelStatus, NoticeLevel, UserInteraction};
use coreup_remote::DownloadProgress;
use indicatif::{HumanBytes, ProgressBar, ProgressStyle};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum OutputStyle {
    Plain,
    Rich,
}

pub fn current_output_style() -> OutputStyle {
    if io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none() {
        OutputStyle::Rich
    } else {
        OutputStyle::Plain
    }
}

pub fn render_status_line(style: OutputStyle, status: &str, message: &str) -> String {
    match style {
        OutputStyle::Plain => message.to_string(),
        OutputStyle::Rich => format!("{} {message}", status_badge(status)),
    }
}

fn status_badge(status: &str) -> &'static str {
    match status {
        "ok" => "[OK]",
        "warn" => "[WARN]",
        "err" => "[ERR]",
        _ => "[..]",
    }
}

fn notice_status(level: NoticeLevel) -> &'static str {
    match level {
        NoticeLevel::Info => "info",
        NoticeLevel::Success => "ok",
        NoticeLevel::Warning => "warn",
        NoticeLevel::Error => "err",
    }
}

fn section_style() -> Style {
    Style::new()
        .fg_color(Some(AnsiColor::BrightBlue.into()))
        .effects(Effects::BOLD)
}

fn colorize(style: Style, text: &str) -> String {
    format!("{}{}{}", style.render(), text, style.render_reset())
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

fn version_or(value: &str, missing: &str) -> String {
    if value.is_empty() {
        missing.to_string()
    } else {
        value.to_string()
    }
}

/// Plain output is one `key=value` line per channel for scripts; rich output
/// is a titled block.
pub fn format_status_lines(status: &ChannelStatus, style: OutputStyle) -> Vec<String> {
    let state = &status.state;
    match style {
        OutputStyle::Plain => vec![format!(
            "channel={} active={} local={} remote={} updatable={} restartable={} rollbackable={} grantable={}",
            status.channel,
            status.active,
            version_or(&state.local_version, "-"),
            version_or(&state.remote_version, "-"),
            status.updatable,
            status.restartable,
            status.rollbackable,
            status.grantable,
        )],
        OutputStyle::Rich => {
            let title = if status.active {
                format!("== {} (active) ==", status.channel)
            } else {
                format!("== {} ==", status.channel)
            };
            let mut lines = vec![
                colorize(section_style(), &title),
                format!("  local:        {}", version_or(&state.local_version, "not installed")),
            ];
            if !state.version_detail.is_empty() && state.version_detail != state.local_version {
                lines.push(format!("  detail:       {}", state.version_detail));
            }
            lines.push(format!(
                "  remote:       {}",
                version_or(&state.remote_version, "unknown")
            ));
            lines.push(format!("  updatable:    {}", yes_no(status.updatable)));
            lines.push(format!("  restartable:  {}", yes_no(status.restartable)));
            lines.push(format!("  rollbackable: {}", yes_no(status.rollbackable)));
            lines.push(format!("  grantable:    {}", yes_no(status.grantable)));
            lines
        }
    }
}

pub fn parse_confirmation(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// Terminal-backed prompts, notices and download progress.
pub struct TerminalUi {
    style: OutputStyle,
    assume_yes: bool,
    progress: Mutex<Option<ProgressBar>>,
}

impl TerminalUi {
    pub fn new(style: OutputStyle, assume_yes: bool) -> Self {
        Self {
            style,
            assume_yes,
            progress: Mutex::new(None),
        }
    }

    fn finish_progress(&self) {
        let mut progress = self
            .progress
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(progress_bar) = progress.take() {
            progress_bar.finish_and_clear();
        }
    }
}

impl UserInteraction for TerminalUi {
    fn confirm(&self, title: &str, message: &str, ok_label: &str) -> bool {
        if self.assume_yes {
            return true;
        }
        if !io::stdin().is_terminal() {
            eprintln!("{title}: {message}");
            eprintln!("refusing without confirmation; pass --yes to proceed");
            return false;
        }

        self.finish_progress();
        eprint!("{title}: {message}\n{ok_label}? [y/N] ");
        if io::stderr().flush().is_err() {
            return false;
        }
        let mut answer = String::new();
        match io::stdin().lock().read_line(&mut answer) {
            Ok(_) => parse_confirmation(&answer),
            Err(_) => false,
        }
    }

    fn notify(&self, level: NoticeLevel, message: &str) {
        self.finish_progress();
        let line = render_status_line(self.style, notice_status(level), message);
        match level {
            NoticeLevel::Error | NoticeLevel::Warning => eprintln!("{line}"),
            NoticeLevel::Info | NoticeLevel::Success => println!("{line}"),
        }
    }

    fn progress(&self, channel: Channel, progress: DownloadProgress) {
        if self.style == OutputStyle::Plain {
            return;
        }

        let mut slot = self
            .progress
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let progress_bar = slot.get_or_insert_with(|| {
            let progress_bar = ProgressBar::new(progress.total.unwrap_or(0).max(1));
            if let Ok(style) = ProgressStyle::with_template(
                "{spinner:.cyan.bold} {msg:<8} [{bar:20.cyan/blue}] {bytes}/{total_bytes} {bytes_per_sec}",
            ) {
                progress_bar.set_style(style.progress_chars("=>-"));
            }
            progress_bar.set_message(channel.to_string());
            progress_bar.enable_steady_tick(Duration::from_millis(80));
            progress_bar
        });

        match progress.total {
            Some(total) => progress_bar.set_length(total.max(1)),
            None => progress_bar.set_message(format!(
                "{channel} {}",
                HumanBytes(progress.downloaded)
            )),
        }
        progress_bar.set_position(progress.downloaded);
    }
}
