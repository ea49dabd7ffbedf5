use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use coreup_core::{CoreError, CoreResult};
use flate2::read::GzDecoder;
use zip::ZipArchive;

pub fn extract_zip(archive_path: &Path, dst: &Path) -> CoreResult<()> {
    let file = File::open(archive_path).map_err(|err| {
        CoreError::install_io(format!("failed to open {}", archive_path.display()), err)
    })?;
    let mut archive = ZipArchive::new(file).map_err(|err| {
        CoreError::Install(format!(
            "failed to read zip archive {}: {err}",
            archive_path.display()
        ))
    })?;
    fs::create_dir_all(dst)
        .map_err(|err| CoreError::install_io(format!("failed to create {}", dst.display()), err))?;
    archive.extract(dst).map_err(|err| {
        CoreError::Install(format!(
            "failed to extract {} into {}: {err}",
            archive_path.display(),
            dst.display()
        ))
    })
}

/// First regular file at the top of `dir` whose name starts with `prefix`.
///
/// Entries are checked in name order so the pick is deterministic.
pub fn find_entry_with_prefix(dir: &Path, prefix: &str) -> CoreResult<Option<PathBuf>> {
    let entries = fs::read_dir(dir)
        .map_err(|err| CoreError::install_io(format!("failed to read {}", dir.display()), err))?;
    let mut candidates = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| {
            CoreError::install_io(format!("failed to read {}", dir.display()), err)
        })?;
        let name = entry.file_name();
        if name.to_string_lossy().starts_with(prefix) && entry.path().is_file() {
            candidates.push(entry.path());
        }
    }
    candidates.sort();
    Ok(candidates.into_iter().next())
}

/// Decompresses a single gzip stream from `src` into `dst`.
pub fn gunzip_file(src: &Path, dst: &Path) -> CoreResult<()> {
    let input = File::open(src)
        .map_err(|err| CoreError::install_io(format!("failed to open {}", src.display()), err))?;
    let output = File::create(dst)
        .map_err(|err| CoreError::install_io(format!("failed to create {}", dst.display()), err))?;
    let mut decoder = GzDecoder::new(input);
    let mut writer = BufWriter::new(output);
    io::copy(&mut decoder, &mut writer).map_err(|err| {
        CoreError::install_io(format!("failed to decompress {}", src.display()), err)
    })?;
    writer
        .flush()
        .map_err(|err| CoreError::install_io(format!("failed to write {}", dst.display()), err))
}
