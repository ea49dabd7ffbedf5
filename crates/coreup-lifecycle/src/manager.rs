use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use coreup_core::{
    requires_risk_confirmation, select_asset, Channel, ChannelSpec, CoreError, CoreResult,
    CpuTier, Platform,
};
use coreup_installer::{
    grant_permission, resolve_local_version, restore_backup, ChannelLock, CommandRunner,
    CoreLayout, InstallEvent, InstallPipeline, InstallRequest, InstallStage, InstalledBinary,
};
use coreup_remote::{fetch_release, resolve_remote_version, CancelToken, ReleaseTransport};
use tracing::{debug, info, warn};

use crate::collaborators::{EngineControl, NoticeLevel, UserInteraction};
use crate::registry::{ChannelRegistry, ChannelSlot};
use crate::state::ChannelStatus;

/// External services the manager drives.
#[derive(Clone)]
pub struct Collaborators {
    pub transport: Arc<dyn ReleaseTransport>,
    pub runner: Arc<dyn CommandRunner>,
    pub engine: Arc<dyn EngineControl>,
    pub ui: Arc<dyn UserInteraction>,
}

/// Coordinates version checks, installs, rollbacks and restarts for every
/// channel the host observes.
pub struct CoreManager {
    layout: CoreLayout,
    platform: Platform,
    specs: BTreeMap<Channel, ChannelSpec>,
    github_token: Option<String>,
    registry: ChannelRegistry,
    pipeline: InstallPipeline,
    deps: Collaborators,
}

impl CoreManager {
    pub fn new(
        layout: CoreLayout,
        platform: Platform,
        active: Channel,
        deps: Collaborators,
    ) -> Self {
        let specs = Channel::ALL
            .into_iter()
            .map(|channel| (channel, channel.spec()))
            .collect();
        Self {
            pipeline: InstallPipeline::new(layout.clone(), platform.os),
            layout,
            platform,
            specs,
            github_token: None,
            registry: ChannelRegistry::new(active),
            deps,
        }
    }

    pub fn with_channel_spec(mut self, channel: Channel, spec: ChannelSpec) -> Self {
        self.specs.insert(channel, spec);
        self
    }

    pub fn with_github_token(mut self, token: Option<String>) -> Self {
        self.github_token = token.filter(|token| !token.trim().is_empty());
        self
    }

    pub fn with_cancel_grace(mut self, grace: Duration) -> Self {
        self.pipeline = self.pipeline.with_cancel_grace(grace);
        self
    }

    pub fn with_backup_delay(mut self, delay: Duration) -> Self {
        self.registry = self.registry.with_backup_delay(delay);
        self
    }

    pub fn layout(&self) -> &CoreLayout {
        &self.layout
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn spec(&self, channel: Channel) -> ChannelSpec {
        self.specs
            .get(&channel)
            .cloned()
            .unwrap_or_else(|| channel.spec())
    }

    fn lock_path(&self, channel: Channel) -> PathBuf {
        self.layout.lock_path(&self.spec(channel))
    }

    pub fn binary(&self, channel: Channel) -> InstalledBinary {
        self.layout.installed_binary(&self.spec(channel), self.platform)
    }

    /// Slot for `channel`, created the first time the host looks at it.
    pub fn observe(&self, channel: Channel) -> Arc<ChannelSlot> {
        self.registry.observe(channel, || self.binary(channel))
    }

    pub fn active_channel(&self) -> Channel {
        self.registry.active_channel()
    }

    pub fn set_active_channel(&self, channel: Channel) -> bool {
        self.registry.set_active_channel(channel)
    }

    pub fn status(&self, channel: Channel) -> ChannelStatus {
        let state = self.observe(channel).snapshot();
        ChannelStatus::derive(
            channel,
            state,
            self.deps.engine.is_running(),
            self.active_channel(),
            self.platform.os,
        )
    }

    /// Re-reads the installed version. Failures leave the version empty and
    /// are only shown to the user when `show_tips` is set.
    pub fn refresh_local_version(&self, channel: Channel, show_tips: bool) -> String {
        let slot = self.observe(channel);
        slot.update(|state| state.local_loading = true);

        let resolved = resolve_local_version(
            self.deps.runner.as_ref(),
            slot.binary().active(),
            &self.spec(channel).version_pattern,
        );
        let local = match resolved {
            Ok(local) => local,
            Err(err) => {
                debug!(%channel, %err, "local version unavailable");
                if show_tips {
                    self.deps.ui.notify(NoticeLevel::Error, &err.to_string());
                }
                Default::default()
            }
        };

        slot.update(|state| {
            state.local_version = local.version.clone();
            state.version_detail = local.detail;
            state.local_loading = false;
        });
        local.version
    }

    pub fn refresh_remote_version(&self, channel: Channel, show_tips: bool) -> String {
        let slot = self.observe(channel);
        slot.update(|state| state.remote_loading = true);

        let remote = match resolve_remote_version(
            self.deps.transport.as_ref(),
            &self.spec(channel),
            self.github_token.as_deref(),
        ) {
            Ok(version) => version,
            Err(err) => {
                debug!(%channel, %err, "remote version unavailable");
                if show_tips {
                    self.deps.ui.notify(NoticeLevel::Error, &err.to_string());
                }
                String::new()
            }
        };

        slot.update(|state| {
            state.remote_version = remote.clone();
            state.remote_loading = false;
        });
        remote
    }

    /// Local and remote checks are independent and run side by side.
    pub fn refresh_versions(&self, channel: Channel, show_tips: bool) -> ChannelStatus {
        thread::scope(|scope| {
            let remote = scope.spawn(|| self.refresh_remote_version(channel, show_tips));
            self.refresh_local_version(channel, show_tips);
            if remote.join().is_err() {
                warn!(%channel, "remote version check panicked");
            }
        });
        self.status(channel)
    }

    /// Downloads and installs the channel's latest release.
    ///
    /// At most one install runs per channel; a second call while one is in
    /// flight fails with `Busy`. Every failure is also reported through the
    /// user interaction.
    pub fn install(
        &self,
        channel: Channel,
        cpu_tier: Option<CpuTier>,
        cancel: &CancelToken,
    ) -> CoreResult<()> {
        let slot = self.observe(channel);
        let _guard = InstallGuard::claim(&slot, &self.lock_path(channel))?;

        let result = self.run_install(&slot, cpu_tier, cancel);
        match &result {
            Ok(()) => {
                slot.update(|state| state.download_completed = true);
                self.refresh_local_version(channel, false);
                info!(%channel, "core updated");
                self.deps
                    .ui
                    .notify(NoticeLevel::Success, &format!("{channel} core updated"));
            }
            Err(err) => {
                slot.update(|state| state.download_completed = false);
                let level = if err.is_user_cancelled() {
                    NoticeLevel::Info
                } else {
                    NoticeLevel::Error
                };
                self.deps.ui.notify(level, &err.to_string());
            }
        }
        result
    }

    fn run_install(
        &self,
        slot: &ChannelSlot,
        cpu_tier: Option<CpuTier>,
        cancel: &CancelToken,
    ) -> CoreResult<()> {
        let channel = slot.channel();
        let spec = self.spec(channel);
        let release = fetch_release(
            self.deps.transport.as_ref(),
            &spec,
            self.github_token.as_deref(),
        )?;
        let remote_version = slot.snapshot().remote_version;
        let asset = select_asset(&spec, &release, &remote_version, self.platform, cpu_tier)?;
        let format = asset.format()?;

        if requires_risk_confirmation(asset) {
            let message = format!(
                "{} was uploaded by '{}' rather than the release automation. Download it anyway?",
                asset.name, asset.uploader.login
            );
            if !self.deps.ui.confirm("Warning", &message, "Still download") {
                return Err(CoreError::UserCancelled);
            }
        }
        if cancel.is_cancelled() {
            return Err(CoreError::UserCancelled);
        }

        let request = InstallRequest {
            asset_name: asset.name.clone(),
            download_url: asset.download_url.clone(),
            format,
            sha256: asset.sha256().map(str::to_string),
        };
        debug!(%channel, asset = %request.asset_name, "installing release asset");

        let ui = Arc::clone(&self.deps.ui);
        self.pipeline.run(
            self.deps.transport.as_ref(),
            &spec,
            &request,
            slot.binary(),
            cancel,
            &mut |event| match event {
                InstallEvent::Stage(stage) => slot.update(|state| state.stage = stage),
                InstallEvent::Progress(progress) => ui.progress(channel, progress),
            },
        )
    }

    /// Restores the previous binary from its backup.
    ///
    /// When the channel's binary is the one the engine is running, the swap
    /// happens inside the engine's restart sequence.
    pub fn rollback(&self, channel: Channel) -> CoreResult<()> {
        let slot = self.observe(channel);
        let confirmed = self.deps.ui.confirm(
            "Warning",
            &format!("Roll the {channel} core back to the previous version?"),
            "Roll back",
        );
        if !confirmed {
            return Err(CoreError::UserCancelled);
        }

        let lock_path = self.lock_path(channel);
        let result = RollbackGuard::claim(&slot, &lock_path).and_then(|_guard| {
            let binary = slot.binary().clone();
            if !binary.backup_exists() {
                return Err(CoreError::Rollback(format!(
                    "no backup found at {}",
                    binary.backup().display()
                )));
            }
            let mut swap = || restore_backup(&binary);
            if self.deps.engine.is_running() && self.active_channel() == channel {
                debug!(%channel, "rolling back through engine restart");
                self.deps.engine.restart(Some(&mut swap))
            } else {
                swap()
            }
        });

        match &result {
            Ok(()) => {
                slot.update(|state| state.download_completed = false);
                self.refresh_local_version(channel, false);
                slot.refresh_backup_now();
                self.deps
                    .ui
                    .notify(NoticeLevel::Success, &format!("{channel} core rolled back"));
            }
            Err(err) => self.deps.ui.notify(NoticeLevel::Error, &err.to_string()),
        }
        result
    }

    /// Restarts the engine if it is running. Returns whether it restarted.
    pub fn restart(&self, channel: Channel) -> CoreResult<bool> {
        if !self.deps.engine.is_running() {
            return Ok(false);
        }
        let slot = self.observe(channel);
        match self.deps.engine.restart(None) {
            Ok(()) => {
                slot.update(|state| state.download_completed = false);
                self.deps.ui.notify(NoticeLevel::Success, "engine restarted");
                Ok(true)
            }
            Err(err) => {
                self.deps.ui.notify(NoticeLevel::Error, &err.to_string());
                Err(err)
            }
        }
    }

    pub fn grant_permission(&self, channel: Channel) -> CoreResult<()> {
        let slot = self.observe(channel);
        grant_permission(
            self.deps.runner.as_ref(),
            self.platform.os,
            slot.binary().active(),
        )?;
        self.deps
            .ui
            .notify(NoticeLevel::Success, &format!("{channel} core granted"));
        Ok(())
    }
}

/// Marks an install attempt in flight for as long as it lives, both in the
/// slot and through the channel's on-disk lock.
struct InstallGuard<'a> {
    slot: &'a ChannelSlot,
    _lock: ChannelLock,
}

impl<'a> InstallGuard<'a> {
    fn claim(slot: &'a ChannelSlot, lock_path: &Path) -> CoreResult<Self> {
        let lock = slot.update(|state| {
            if state.is_busy() {
                return Err(CoreError::Busy {
                    channel: slot.channel().to_string(),
                });
            }
            let lock = ChannelLock::acquire(lock_path, slot.channel().as_str(), "install")?;
            state.download_in_progress = true;
            state.stage = InstallStage::Idle;
            Ok(lock)
        })?;
        Ok(Self { slot, _lock: lock })
    }
}

impl Drop for InstallGuard<'_> {
    fn drop(&mut self) {
        self.slot.update(|state| {
            state.download_in_progress = false;
            if state.stage.is_in_flight() {
                state.stage = InstallStage::Failed;
            }
        });
    }
}

struct RollbackGuard<'a> {
    slot: &'a ChannelSlot,
    _lock: ChannelLock,
}

impl<'a> RollbackGuard<'a> {
    fn claim(slot: &'a ChannelSlot, lock_path: &Path) -> CoreResult<Self> {
        let lock = slot.update(|state| {
            if state.is_busy() {
                return Err(CoreError::Busy {
                    channel: slot.channel().to_string(),
                });
            }
            let lock = ChannelLock::acquire(lock_path, slot.channel().as_str(), "rollback")?;
            state.rollback_in_progress = true;
            Ok(lock)
        })?;
        Ok(Self { slot, _lock: lock })
    }
}

impl Drop for RollbackGuard<'_> {
    fn drop(&mut self) {
        self.slot.update(|state| state.rollback_in_progress = false);
    }
}
