use coreup_core::{Channel, Os};
use coreup_installer::InstallStage;

/// Per-channel lifecycle fields. Flags are derived on read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleState {
    /// Empty when the binary is missing or its version is unknown.
    pub local_version: String,
    pub version_detail: String,
    /// Empty until a remote check succeeds.
    pub remote_version: String,
    pub local_loading: bool,
    pub remote_loading: bool,
    pub download_in_progress: bool,
    pub download_completed: bool,
    pub rollback_in_progress: bool,
    pub backup_exists: bool,
    pub stage: InstallStage,
}

impl Default for LifecycleState {
    fn default() -> Self {
        Self {
            local_version: String::new(),
            version_detail: String::new(),
            remote_version: String::new(),
            local_loading: false,
            remote_loading: false,
            download_in_progress: false,
            download_completed: false,
            rollback_in_progress: false,
            backup_exists: false,
            stage: InstallStage::Idle,
        }
    }
}

impl LifecycleState {
    pub fn updatable(&self) -> bool {
        !self.remote_version.is_empty() && self.remote_version != self.local_version
    }

    pub fn restartable(&self, engine_running: bool, active: Channel, channel: Channel) -> bool {
        engine_running
            && !self.local_version.is_empty()
            && self.download_completed
            && active == channel
    }

    pub fn grantable(&self, os: Os) -> bool {
        !self.local_version.is_empty() && os.supports_permission_grant()
    }

    pub fn rollbackable(&self) -> bool {
        self.backup_exists
    }

    pub fn is_busy(&self) -> bool {
        self.download_in_progress || self.rollback_in_progress || self.stage.is_in_flight()
    }
}

/// Lifecycle fields of one channel together with its derived flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelStatus {
    pub channel: Channel,
    pub active: bool,
    pub state: LifecycleState,
    pub updatable: bool,
    pub restartable: bool,
    pub grantable: bool,
    pub rollbackable: bool,
}

impl ChannelStatus {
    pub fn derive(
        channel: Channel,
        state: LifecycleState,
        engine_running: bool,
        active: Channel,
        os: Os,
    ) -> Self {
        Self {
            channel,
            active: channel == active,
            updatable: state.updatable(),
            restartable: state.restartable(engine_running, active, channel),
            grantable: state.grantable(os),
            rollbackable: state.rollbackable(),
            state,
        }
    }
}
