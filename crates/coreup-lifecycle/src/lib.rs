mod collaborators;
mod debounce;
mod manager;
mod registry;
mod state;

pub use collaborators::{DetachedEngine, EngineControl, NoticeLevel, UserInteraction};
pub use debounce::Debouncer;
pub use manager::{Collaborators, CoreManager};
pub use registry::{ChannelRegistry, ChannelSlot, BACKUP_REFRESH_DELAY};
pub use state::{ChannelStatus, LifecycleState};
