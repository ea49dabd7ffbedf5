use std::ffi::OsStr;
use std::path::Path;
use std::process::Command;

use coreup_core::{CoreError, CoreResult, LocalVersion};
use tracing::debug;

/// Runs external programs and returns their standard output.
pub trait CommandRunner: Send + Sync {
    fn exec(&self, program: &Path, args: &[&OsStr]) -> CoreResult<String>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn exec(&self, program: &Path, args: &[&OsStr]) -> CoreResult<String> {
        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|err| CoreError::Execution {
                path: program.to_path_buf(),
                message: err.to_string(),
            })?;
        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(CoreError::Execution {
            path: program.to_path_buf(),
            message: format!("status={} stderr='{}'", output.status, stderr.trim()),
        })
    }
}

/// Asks the installed binary for its version (`<binary> -v`).
///
/// A missing binary is an `Execution` error, which callers treat as
/// "not installed".
pub fn resolve_local_version(
    runner: &dyn CommandRunner,
    binary: &Path,
    pattern: &str,
) -> CoreResult<LocalVersion> {
    if !binary.is_file() {
        return Err(CoreError::Execution {
            path: binary.to_path_buf(),
            message: "binary not found".to_string(),
        });
    }

    let output = runner.exec(binary, &[OsStr::new("-v")])?;
    let local = LocalVersion::from_output(pattern, &output);
    debug!(binary = %binary.display(), version = %local.version, "probed local version");
    Ok(local)
}
