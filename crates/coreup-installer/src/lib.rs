mod extract;
mod fs_utils;
mod layout;
mod lock;
mod permissions;
mod pipeline;
mod probe;
mod rollback;

pub use extract::{extract_zip, find_entry_with_prefix, gunzip_file};
pub use fs_utils::{remove_dir_if_exists, remove_file_if_exists, replace_file};
pub use layout::{CoreLayout, InstalledBinary};
pub use lock::ChannelLock;
pub use permissions::{grant_permission, mark_executable};
pub use pipeline::{
    InstallEvent, InstallPipeline, InstallRequest, InstallStage, DEFAULT_CANCEL_GRACE,
};
pub use probe::{resolve_local_version, CommandRunner, SystemCommandRunner};
pub use rollback::restore_backup;
