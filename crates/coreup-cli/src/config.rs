use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use coreup_core::{Channel, CpuTier};
use serde::{Deserialize, Serialize};

pub const HOME_ENV: &str = "COREUP_HOME";
pub const TOKEN_ENV: &str = "GITHUB_TOKEN";

/// Contents of `<prefix>/config.toml`. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreupConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_channel: Option<Channel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_tier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub github_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine: Option<EngineCommands>,
}

/// Shell-free argv lists used to control the engine process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineCommands {
    pub status: Vec<String>,
    pub stop: Vec<String>,
    pub start: Vec<String>,
}

impl CoreupConfig {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("failed to parse config: {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let rendered = toml::to_string_pretty(self).context("failed to serialize config")?;
        fs::write(path, rendered)
            .with_context(|| format!("failed to write config: {}", path.display()))
    }

    pub fn active_channel(&self) -> Channel {
        self.active_channel.unwrap_or(Channel::Stable)
    }

    pub fn cpu_tier(&self) -> Result<Option<CpuTier>> {
        match self.cpu_tier.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(raw) => CpuTier::parse(raw).map(Some).ok_or_else(|| {
                anyhow!("invalid cpu_tier '{raw}' in config (expected v1, v2 or v3)")
            }),
        }
    }

    /// Configured token, falling back to `$GITHUB_TOKEN` when unset.
    pub fn github_token(&self) -> Option<String> {
        resolve_github_token(self.github_token.as_deref(), std::env::var(TOKEN_ENV).ok())
    }
}

pub fn resolve_github_token(configured: Option<&str>, env_token: Option<String>) -> Option<String> {
    configured
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .or_else(|| env_token.filter(|token| !token.trim().is_empty()))
}

/// `--prefix`, else `$COREUP_HOME`, else the per-user default.
pub fn resolve_prefix(cli_prefix: Option<&Path>) -> Result<PathBuf> {
    if let Some(prefix) = cli_prefix {
        return Ok(prefix.to_path_buf());
    }
    match std::env::var_os(HOME_ENV) {
        Some(home) if !home.is_empty() => Ok(PathBuf::from(home)),
        _ => default_user_prefix(),
    }
}

pub fn default_user_prefix() -> Result<PathBuf> {
    if cfg!(windows) {
        let app_data = std::env::var("LOCALAPPDATA")
            .context("LOCALAPPDATA is not set; cannot resolve Windows user prefix")?;
        return Ok(PathBuf::from(app_data).join("Coreup"));
    }

    let home = std::env::var("HOME").context("HOME is not set; cannot resolve user prefix")?;
    Ok(PathBuf::from(home).join(".coreup"))
}
