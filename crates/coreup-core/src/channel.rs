use std::fmt;

use serde::{Deserialize, Serialize};

use crate::platform::{Arch, CpuTier, Platform};

const STABLE_METADATA_URL: &str = "https://api.github.com/repos/MetaCubeX/mihomo/releases/latest";
const ALPHA_METADATA_URL: &str =
    "https://api.github.com/repos/MetaCubeX/mihomo/releases/tags/Prerelease-Alpha";
const SMART_METADATA_URL: &str =
    "https://api.github.com/repos/vernesong/mihomo/releases/tags/Prerelease-Alpha";

const ALPHA_VERSION_FILE_URL: &str =
    "https://github.com/MetaCubeX/mihomo/releases/download/Prerelease-Alpha/version.txt";
const SMART_VERSION_FILE_URL: &str =
    "https://github.com/vernesong/mihomo/releases/download/Prerelease-Alpha/version.txt";

const STABLE_RELEASE_PAGE: &str = "https://github.com/MetaCubeX/mihomo/releases/latest";
const ALPHA_RELEASE_PAGE: &str =
    "https://github.com/MetaCubeX/mihomo/releases/tag/Prerelease-Alpha";
const SMART_RELEASE_PAGE: &str =
    "https://github.com/vernesong/mihomo/releases/tag/Prerelease-Alpha";

pub const DEFAULT_ASSET_TEMPLATE: &str = "{prefix}-{os}-{arch}{tier}-{version}.{ext}";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Stable,
    Alpha,
    Smart,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::Stable, Channel::Alpha, Channel::Smart];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stable => "stable",
            Self::Alpha => "alpha",
            Self::Smart => "smart",
        }
    }

    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "stable" | "main" => Some(Self::Stable),
            "alpha" => Some(Self::Alpha),
            "smart" => Some(Self::Smart),
            _ => None,
        }
    }

    /// Built-in release source for this channel.
    pub fn spec(self) -> ChannelSpec {
        match self {
            Self::Stable => ChannelSpec {
                metadata_url: STABLE_METADATA_URL.to_string(),
                version_file_url: None,
                release_page: STABLE_RELEASE_PAGE.to_string(),
                version_pattern: r"v\S+".to_string(),
                cache_dir: "stable".to_string(),
                binary_prefix: "mihomo".to_string(),
                binary_stem: "mihomo".to_string(),
                asset_template: DEFAULT_ASSET_TEMPLATE.to_string(),
                asset_version: AssetVersionSource::ReleaseName,
            },
            Self::Alpha => ChannelSpec {
                metadata_url: ALPHA_METADATA_URL.to_string(),
                version_file_url: Some(ALPHA_VERSION_FILE_URL.to_string()),
                release_page: ALPHA_RELEASE_PAGE.to_string(),
                version_pattern: r"(?i)alpha-\S+".to_string(),
                cache_dir: "alpha".to_string(),
                binary_prefix: "mihomo".to_string(),
                binary_stem: "mihomo-alpha".to_string(),
                asset_template: DEFAULT_ASSET_TEMPLATE.to_string(),
                asset_version: AssetVersionSource::RemoteVersion,
            },
            Self::Smart => ChannelSpec {
                metadata_url: SMART_METADATA_URL.to_string(),
                version_file_url: Some(SMART_VERSION_FILE_URL.to_string()),
                release_page: SMART_RELEASE_PAGE.to_string(),
                version_pattern: r"(?i)smart-\S+".to_string(),
                cache_dir: "smart".to_string(),
                binary_prefix: "mihomo".to_string(),
                binary_stem: "mihomo-smart".to_string(),
                asset_template: DEFAULT_ASSET_TEMPLATE.to_string(),
                asset_version: AssetVersionSource::RemoteVersion,
            },
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which version string is substituted into the expected asset name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AssetVersionSource {
    /// Always the release name from the metadata response.
    ReleaseName,
    /// The previously resolved remote version, falling back to the release name.
    RemoteVersion,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSpec {
    pub metadata_url: String,
    pub version_file_url: Option<String>,
    pub release_page: String,
    pub version_pattern: String,
    pub cache_dir: String,
    /// Name prefix shared by release assets and the binary inside zip archives.
    pub binary_prefix: String,
    /// File stem of the active binary in the working directory.
    pub binary_stem: String,
    pub asset_template: String,
    pub asset_version: AssetVersionSource,
}

impl ChannelSpec {
    /// Expected asset file name for a release version on a platform.
    ///
    /// The tier suffix is only emitted for amd64 builds.
    pub fn asset_file_name(
        &self,
        version: &str,
        platform: Platform,
        cpu_tier: Option<CpuTier>,
    ) -> String {
        let tier = match (platform.arch, cpu_tier) {
            (Arch::Amd64, Some(tier)) => format!("-{}", tier.as_str()),
            _ => String::new(),
        };
        self.asset_template
            .replace("{prefix}", &self.binary_prefix)
            .replace("{os}", platform.os.as_str())
            .replace("{arch}", platform.arch.as_str())
            .replace("{tier}", &tier)
            .replace("{version}", version)
            .replace("{ext}", platform.os.release_archive().extension())
    }

    /// Version that goes into the asset name for a fetched release.
    pub fn asset_version<'a>(&self, release_name: &'a str, remote_version: &'a str) -> &'a str {
        match self.asset_version {
            AssetVersionSource::ReleaseName => release_name,
            AssetVersionSource::RemoteVersion if !remote_version.is_empty() => remote_version,
            AssetVersionSource::RemoteVersion => release_name,
        }
    }

    pub fn binary_file_name(&self, platform: Platform) -> String {
        format!("{}{}", self.binary_stem, platform.os.executable_suffix())
    }
}
