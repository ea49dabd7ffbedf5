use std::fs;
use std::path::{Path, PathBuf};

use coreup_core::{ChannelSpec, CoreError, CoreResult, Platform};

/// On-disk locations owned by the manager under a single prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreLayout {
    prefix: PathBuf,
}

impl CoreLayout {
    pub fn new(prefix: impl Into<PathBuf>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &Path {
        &self.prefix
    }

    /// Directory holding the active core binaries of every channel.
    pub fn working_dir(&self) -> PathBuf {
        self.prefix.join("core")
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.prefix.join("cache")
    }

    pub fn config_path(&self) -> PathBuf {
        self.prefix.join("config.toml")
    }

    /// Per-channel scratch root; removed at the end of every pipeline run.
    pub fn channel_cache_dir(&self, spec: &ChannelSpec) -> PathBuf {
        self.cache_dir().join(&spec.cache_dir)
    }

    pub fn download_cache_path(&self, spec: &ChannelSpec, asset_name: &str) -> PathBuf {
        self.channel_cache_dir(spec).join("downloads").join(asset_name)
    }

    /// Scratch directory a zip asset is unpacked into.
    pub fn extract_dir(&self, spec: &ChannelSpec) -> PathBuf {
        self.channel_cache_dir(spec).join("extract")
    }

    /// Scratch file a gzip asset is decompressed into before the swap.
    pub fn unpacked_path(&self, spec: &ChannelSpec) -> PathBuf {
        self.channel_cache_dir(spec).join("unpacked")
    }

    /// Where the previous backup waits while a new one is taken, so a failed
    /// swap can put it back.
    pub fn retired_backup_path(&self, spec: &ChannelSpec) -> PathBuf {
        self.channel_cache_dir(spec).join("retired.bak")
    }

    /// Marker claimed by the process that is installing or rolling back the
    /// channel. Lives beside the scratch root so scratch cleanup keeps it.
    pub fn lock_path(&self, spec: &ChannelSpec) -> PathBuf {
        self.cache_dir().join(format!("{}.lock", spec.cache_dir))
    }

    pub fn installed_binary(&self, spec: &ChannelSpec, platform: Platform) -> InstalledBinary {
        InstalledBinary::new(self.working_dir().join(spec.binary_file_name(platform)))
    }

    pub fn ensure_base_dirs(&self) -> CoreResult<()> {
        for dir in [self.working_dir(), self.cache_dir()] {
            create_dir(&dir)?;
        }
        Ok(())
    }

    /// Creates the base directories plus the channel's download directory.
    pub fn ensure_channel_dirs(&self, spec: &ChannelSpec) -> CoreResult<()> {
        self.ensure_base_dirs()?;
        create_dir(&self.channel_cache_dir(spec).join("downloads"))
    }
}

fn create_dir(dir: &Path) -> CoreResult<()> {
    fs::create_dir_all(dir).map_err(|err| {
        CoreError::install_io(format!("failed to create {}", dir.display()), err)
    })
}

/// The active executable of a channel and its single adjacent backup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledBinary {
    active: PathBuf,
    backup: PathBuf,
}

impl InstalledBinary {
    pub fn new(active: impl Into<PathBuf>) -> Self {
        let active = active.into();
        let mut backup = active.clone().into_os_string();
        backup.push(".bak");
        Self {
            active,
            backup: PathBuf::from(backup),
        }
    }

    pub fn active(&self) -> &Path {
        &self.active
    }

    pub fn backup(&self) -> &Path {
        &self.backup
    }

    pub fn exists(&self) -> bool {
        self.active.is_file()
    }

    pub fn backup_exists(&self) -> bool {
        self.backup.is_file()
    }
}
