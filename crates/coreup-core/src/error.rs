use std::path::PathBuf;

/// Failures raised while resolving, installing or reverting a core binary.
///
/// Resolution errors (`Execution`, `Remote`) are non-fatal and are folded into
/// an "unknown version" state by callers. Everything else aborts the current
/// install or rollback attempt.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("failed to execute {}: {message}", path.display())]
    Execution { path: PathBuf, message: String },

    #[error("remote error: {0}")]
    Remote(String),

    #[error("asset not found: {expected}")]
    AssetNotFound { expected: String },

    #[error("no entry starting with '{prefix}' in archive {archive}")]
    AssetLayout { prefix: String, archive: String },

    #[error("unsupported asset format: {asset}")]
    UnsupportedFormat { asset: String },

    #[error("operation cancelled by user")]
    UserCancelled,

    #[error("download failed: {0}")]
    Download(String),

    #[error("checksum mismatch for {asset}: expected {expected}, got {actual}")]
    Integrity {
        asset: String,
        expected: String,
        actual: String,
    },

    #[error("rollback failed: {0}")]
    Rollback(String),

    #[error("an install is already in progress for channel '{channel}'")]
    Busy { channel: String },

    #[error("install failed: {0}")]
    Install(String),
}

impl CoreError {
    pub fn is_user_cancelled(&self) -> bool {
        matches!(self, Self::UserCancelled)
    }

    /// Errors that only mean "version unknown" rather than a failed operation.
    pub fn is_resolution_error(&self) -> bool {
        matches!(self, Self::Execution { .. } | Self::Remote(_))
    }

    pub fn install_io(context: impl std::fmt::Display, err: std::io::Error) -> Self {
        Self::Install(format!("{context}: {err}"))
    }
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;
