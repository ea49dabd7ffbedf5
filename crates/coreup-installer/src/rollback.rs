use coreup_core::{CoreError, CoreResult};
use tracing::info;

use crate::fs_utils::replace_file;
use crate::layout::InstalledBinary;

/// Puts the backup back in place of the active binary.
///
/// The active binary is left untouched when there is no backup.
pub fn restore_backup(binary: &InstalledBinary) -> CoreResult<()> {
    if !binary.backup_exists() {
        return Err(CoreError::Rollback(format!(
            "no backup found at {}",
            binary.backup().display()
        )));
    }

    replace_file(binary.backup(), binary.active()).map_err(|err| {
        CoreError::Rollback(format!(
            "failed to move {} to {}: {err}",
            binary.backup().display(),
            binary.active().display()
        ))
    })?;
    info!(path = %binary.active().display(), "restored core from backup");
    Ok(())
}
