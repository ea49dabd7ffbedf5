mod channel;
mod error;
mod platform;
mod release;
mod version;

pub use channel::{AssetVersionSource, Channel, ChannelSpec, DEFAULT_ASSET_TEMPLATE};
pub use error::{CoreError, CoreResult};
pub use platform::{Arch, ArchiveFormat, CpuTier, Os, Platform};
pub use release::{
    requires_risk_confirmation, select_asset, Asset, ReleaseMetadata, Uploader, UploaderKind,
};
pub use version::{extract_version, LocalVersion};
