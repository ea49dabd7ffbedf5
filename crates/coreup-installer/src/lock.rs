use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use coreup_core::{CoreError, CoreResult};
use tracing::{debug, warn};

use crate::fs_utils::remove_file_if_exists;

/// Marker file that makes installs and rollbacks of one channel exclusive
/// across processes sharing a prefix. Removed when dropped.
#[derive(Debug)]
pub struct ChannelLock {
    path: PathBuf,
}

impl ChannelLock {
    /// Claims `path` for `operation` on `channel`. Fails with `Busy` when
    /// another holder already owns the marker.
    pub fn acquire(path: &Path, channel: &str, operation: &str) -> CoreResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| {
                CoreError::install_io(format!("failed to create {}", parent.display()), err)
            })?;
        }

        let mut file = match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
        {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                let holder = fs::read_to_string(path).unwrap_or_default();
                warn!(
                    path = %path.display(),
                    holder = holder.trim(),
                    "channel is locked by another operation"
                );
                return Err(CoreError::Busy {
                    channel: channel.to_string(),
                });
            }
            Err(err) => {
                return Err(CoreError::install_io(
                    format!("failed to claim channel lock {}", path.display()),
                    err,
                ));
            }
        };

        let lock = Self {
            path: path.to_path_buf(),
        };
        file.write_all(format!("{operation} pid={}\n", std::process::id()).as_bytes())
            .map_err(|err| {
                CoreError::install_io(format!("failed to write {}", path.display()), err)
            })?;
        debug!(path = %path.display(), operation, "channel lock acquired");
        Ok(lock)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ChannelLock {
    fn drop(&mut self) {
        if let Err(err) = remove_file_if_exists(&self.path) {
            warn!(path = %self.path.display(), %err, "failed to release channel lock");
        }
    }
}
