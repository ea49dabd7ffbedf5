use std::fmt;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use coreup_core::{ArchiveFormat, ChannelSpec, CoreError, CoreResult, Os};
use coreup_remote::{CancelToken, DownloadProgress, ReleaseTransport};
use coreup_security::verify_sha256_file;
use tracing::{debug, info, warn};

use crate::extract::{extract_zip, find_entry_with_prefix, gunzip_file};
use crate::fs_utils::{remove_file_if_exists, replace_file, ScratchPaths};
use crate::layout::{CoreLayout, InstalledBinary};
use crate::permissions::mark_executable;

pub const DEFAULT_CANCEL_GRACE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallStage {
    Idle,
    Downloading,
    BackingUp,
    Extracting,
    Swapping,
    FinalizingPermissions,
    Done,
    Failed,
}

impl InstallStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Downloading => "downloading",
            Self::BackingUp => "backing-up",
            Self::Extracting => "extracting",
            Self::Swapping => "swapping",
            Self::FinalizingPermissions => "finalizing-permissions",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    /// Whether a pipeline run is currently between start and a terminal state.
    pub fn is_in_flight(self) -> bool {
        !matches!(self, Self::Idle | Self::Done | Self::Failed)
    }
}

impl fmt::Display for InstallStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InstallEvent {
    Stage(InstallStage),
    Progress(DownloadProgress),
}

/// Everything the pipeline needs to know about the asset it installs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallRequest {
    pub asset_name: String,
    pub download_url: String,
    pub format: ArchiveFormat,
    pub sha256: Option<String>,
}

#[derive(Debug, Clone)]
pub struct InstallPipeline {
    layout: CoreLayout,
    os: Os,
    cancel_grace: Duration,
}

impl InstallPipeline {
    pub fn new(layout: CoreLayout, os: Os) -> Self {
        Self {
            layout,
            os,
            cancel_grace: DEFAULT_CANCEL_GRACE,
        }
    }

    pub fn with_cancel_grace(mut self, grace: Duration) -> Self {
        self.cancel_grace = grace;
        self
    }

    pub fn layout(&self) -> &CoreLayout {
        &self.layout
    }

    /// Downloads `request` and swaps it in as `target`'s active binary.
    ///
    /// The payload is staged in channel scratch space before the active
    /// binary or its backup is touched. Emits `Failed` as the last stage on
    /// any error. Scratch space is removed on every exit path, and a failed
    /// swap puts back both the previous binary and the previous backup.
    pub fn run(
        &self,
        transport: &dyn ReleaseTransport,
        spec: &ChannelSpec,
        request: &InstallRequest,
        target: &InstalledBinary,
        cancel: &CancelToken,
        observer: &mut dyn FnMut(InstallEvent),
    ) -> CoreResult<()> {
        let result = self.run_stages(transport, spec, request, target, cancel, observer);
        match &result {
            Ok(()) => {
                info!(
                    asset = %request.asset_name,
                    path = %target.active().display(),
                    "core installed"
                );
                observer(InstallEvent::Stage(InstallStage::Done));
            }
            Err(err) => {
                warn!(asset = %request.asset_name, %err, "core install failed");
                observer(InstallEvent::Stage(InstallStage::Failed));
            }
        }
        result
    }

    fn run_stages(
        &self,
        transport: &dyn ReleaseTransport,
        spec: &ChannelSpec,
        request: &InstallRequest,
        target: &InstalledBinary,
        cancel: &CancelToken,
        observer: &mut dyn FnMut(InstallEvent),
    ) -> CoreResult<()> {
        let mut scratch = ScratchPaths::default();
        scratch.dir(self.layout.channel_cache_dir(spec));
        self.layout.ensure_channel_dirs(spec)?;

        let cache_file = self.layout.download_cache_path(spec, &request.asset_name);
        observer(InstallEvent::Stage(InstallStage::Downloading));
        self.download(transport, request, &cache_file, cancel, observer)?;
        verify_download(request, &cache_file)?;

        let staged = self.stage_payload(spec, request, &cache_file, observer)?;

        observer(InstallEvent::Stage(InstallStage::BackingUp));
        let backup = back_up_active(target, &self.layout.retired_backup_path(spec));

        observer(InstallEvent::Stage(InstallStage::Swapping));
        if let Err(err) = replace_file(&staged, target.active()) {
            backup.undo(target);
            return Err(CoreError::install_io(
                format!("failed to move core into {}", target.active().display()),
                err,
            ));
        }

        observer(InstallEvent::Stage(InstallStage::FinalizingPermissions));
        if self.os.needs_exec_bit() {
            if let Err(err) = mark_executable(target.active()) {
                warn!(
                    path = %target.active().display(),
                    %err,
                    "could not mark core executable; continuing"
                );
            }
        }

        Ok(())
    }

    fn download(
        &self,
        transport: &dyn ReleaseTransport,
        request: &InstallRequest,
        cache_file: &Path,
        cancel: &CancelToken,
        observer: &mut dyn FnMut(InstallEvent),
    ) -> CoreResult<()> {
        debug!(
            url = %request.download_url,
            cache = %cache_file.display(),
            "downloading core asset"
        );
        let mut on_progress =
            |progress: DownloadProgress| observer(InstallEvent::Progress(progress));
        let downloaded =
            transport.download_to_file(&request.download_url, cache_file, &mut on_progress, cancel);
        match downloaded {
            Ok(()) => Ok(()),
            Err(CoreError::UserCancelled) => {
                // The transport may still be releasing the file handle.
                thread::sleep(self.cancel_grace);
                if let Err(err) = remove_file_if_exists(cache_file) {
                    warn!(
                        path = %cache_file.display(),
                        %err,
                        "failed to remove cancelled download"
                    );
                }
                Err(CoreError::UserCancelled)
            }
            Err(err) => Err(err),
        }
    }

    /// Unpacks the downloaded asset into channel scratch space and returns
    /// the binary to swap in. Nothing under the working dir is touched.
    fn stage_payload(
        &self,
        spec: &ChannelSpec,
        request: &InstallRequest,
        cache_file: &Path,
        observer: &mut dyn FnMut(InstallEvent),
    ) -> CoreResult<PathBuf> {
        observer(InstallEvent::Stage(InstallStage::Extracting));
        match request.format {
            ArchiveFormat::Zip => {
                let extract_dir = self.layout.extract_dir(spec);
                extract_zip(cache_file, &extract_dir)?;
                find_entry_with_prefix(&extract_dir, &spec.binary_prefix)?.ok_or_else(|| {
                    CoreError::AssetLayout {
                        prefix: spec.binary_prefix.clone(),
                        archive: request.asset_name.clone(),
                    }
                })
            }
            ArchiveFormat::Gzip => {
                let unpacked = self.layout.unpacked_path(spec);
                gunzip_file(cache_file, &unpacked)?;
                Ok(unpacked)
            }
        }
    }
}

fn verify_download(request: &InstallRequest, cache_file: &Path) -> CoreResult<()> {
    let Some(expected) = request.sha256.as_deref() else {
        return Ok(());
    };
    let (matches, actual) = verify_sha256_file(cache_file, expected)
        .map_err(|err| CoreError::Install(format!("{err:#}")))?;
    if !matches {
        return Err(CoreError::Integrity {
            asset: request.asset_name.clone(),
            expected: expected.to_string(),
            actual,
        });
    }
    Ok(())
}

/// Files moved by [`back_up_active`], so a failed swap can put every one of
/// them back.
#[derive(Debug, Default)]
pub(crate) struct BackupMoves {
    made: bool,
    retired: Option<PathBuf>,
}

impl BackupMoves {
    /// Restores the active binary from the new backup, then the previous
    /// backup from where it was set aside.
    pub(crate) fn undo(self, target: &InstalledBinary) {
        if self.made {
            if let Err(err) = replace_file(target.backup(), target.active()) {
                warn!(backup = %target.backup().display(), %err, "failed to restore previous core");
            }
        }
        if let Some(retired) = self.retired {
            if let Err(err) = replace_file(&retired, target.backup()) {
                warn!(path = %retired.display(), %err, "failed to restore previous backup");
            }
        }
    }
}

/// Moves the active binary over the backup slot. An existing backup is first
/// set aside at `retired`. A missing active binary (fresh install) leaves
/// everything alone; any other failure means the install proceeds without a
/// backup.
pub(crate) fn back_up_active(target: &InstalledBinary, retired: &Path) -> BackupMoves {
    if !target.exists() {
        debug!(path = %target.active().display(), "no active core to back up");
        return BackupMoves::default();
    }

    let mut moves = BackupMoves::default();
    if target.backup_exists() {
        match replace_file(target.backup(), retired) {
            Ok(()) => moves.retired = Some(retired.to_path_buf()),
            Err(err) => {
                warn!(backup = %target.backup().display(), %err, "backup skipped");
                return moves;
            }
        }
    }

    match replace_file(target.active(), target.backup()) {
        Ok(()) => {
            debug!(backup = %target.backup().display(), "backed up active core");
            moves.made = true;
        }
        Err(err) => {
            warn!(path = %target.active().display(), %err, "backup skipped");
            moves.undo(target);
            return BackupMoves::default();
        }
    }
    moves
}
