use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

pub fn remove_file_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err),
    }
}

pub fn remove_dir_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err),
    }
}

/// Moves `src` over `dst`, replacing an existing destination.
///
/// Falls back to copy + remove when a rename is not possible (for example
/// across file systems).
pub fn replace_file(src: &Path, dst: &Path) -> io::Result<()> {
    if !src.exists() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} does not exist", src.display()),
        ));
    }

    if fs::rename(src, dst).is_ok() {
        return Ok(());
    }

    if dst.exists() {
        fs::remove_file(dst)?;
        if fs::rename(src, dst).is_ok() {
            return Ok(());
        }
    }

    fs::copy(src, dst)?;
    fs::remove_file(src)
}

/// Scratch directories that must be gone when a pipeline run ends, however
/// it ends.
#[derive(Debug, Default)]
pub struct ScratchPaths {
    dirs: Vec<PathBuf>,
}

impl ScratchPaths {
    pub fn dir(&mut self, path: PathBuf) -> &mut Self {
        self.dirs.push(path);
        self
    }
}

impl Drop for ScratchPaths {
    fn drop(&mut self) {
        for dir in &self.dirs {
            if let Err(err) = remove_dir_if_exists(dir) {
                debug!(path = %dir.display(), %err, "failed to remove scratch dir");
            }
        }
    }
}
