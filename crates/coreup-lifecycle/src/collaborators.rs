use coreup_core::{Channel, CoreResult};
use coreup_remote::DownloadProgress;

/// Control surface of the running engine process.
pub trait EngineControl: Send + Sync {
    fn is_running(&self) -> bool;

    /// Restarts the engine. `pre_swap` runs while the engine is stopped, which
    /// is the only safe moment to replace its binary on some platforms.
    fn restart(&self, pre_swap: Option<&mut dyn FnMut() -> CoreResult<()>>) -> CoreResult<()>;
}

/// Engine control for hosts that do not run the engine themselves.
#[derive(Debug, Clone, Copy, Default)]
pub struct DetachedEngine;

impl EngineControl for DetachedEngine {
    fn is_running(&self) -> bool {
        false
    }

    fn restart(&self, pre_swap: Option<&mut dyn FnMut() -> CoreResult<()>>) -> CoreResult<()> {
        match pre_swap {
            Some(step) => step(),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

pub trait UserInteraction: Send + Sync {
    /// Asks before a destructive or risky step. `false` aborts the operation.
    fn confirm(&self, title: &str, message: &str, ok_label: &str) -> bool;

    fn notify(&self, level: NoticeLevel, message: &str);

    fn progress(&self, _channel: Channel, _progress: DownloadProgress) {}
}
