use serde::{Deserialize, Serialize};

use crate::channel::ChannelSpec;
use crate::error::{CoreError, CoreResult};
use crate::platform::{ArchiveFormat, CpuTier, Platform};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum UploaderKind {
    /// Uploaded by the release automation account.
    Bot,
    /// Uploaded by hand; the binary did not come out of CI.
    User,
}

impl From<String> for UploaderKind {
    fn from(value: String) -> Self {
        if value == "Bot" {
            Self::Bot
        } else {
            Self::User
        }
    }
}

impl From<UploaderKind> for String {
    fn from(value: UploaderKind) -> Self {
        match value {
            UploaderKind::Bot => "Bot".to_string(),
            UploaderKind::User => "User".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Uploader {
    #[serde(rename = "type")]
    pub kind: UploaderKind,
    #[serde(default)]
    pub login: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub name: String,
    #[serde(rename = "browser_download_url")]
    pub download_url: String,
    pub uploader: Uploader,
    #[serde(default)]
    pub digest: Option<String>,
}

impl Asset {
    pub fn format(&self) -> CoreResult<ArchiveFormat> {
        ArchiveFormat::infer_from_name(&self.name).ok_or_else(|| CoreError::UnsupportedFormat {
            asset: self.name.clone(),
        })
    }

    /// Hex SHA-256 advertised by the release API, if any.
    pub fn sha256(&self) -> Option<&str> {
        self.digest
            .as_deref()
            .and_then(|digest| digest.strip_prefix("sha256:"))
            .filter(|hex| !hex.is_empty())
    }
}

/// Release description as returned by the metadata endpoint. Fetched per
/// check and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseMetadata {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub tag_name: String,
    #[serde(default)]
    pub assets: Vec<Asset>,
}

#[derive(Deserialize)]
struct ReleaseResponse {
    #[serde(default)]
    message: Option<String>,
    #[serde(flatten)]
    release: ReleaseMetadata,
}

impl ReleaseMetadata {
    /// Parses a metadata response body. An API-reported `message` (rate limit,
    /// missing tag) is a remote error even when the HTTP status was fine.
    pub fn parse(body: &str) -> CoreResult<Self> {
        let response: ReleaseResponse = serde_json::from_str(body)
            .map_err(|err| CoreError::Remote(format!("invalid release metadata: {err}")))?;
        if let Some(message) = response.message.filter(|message| !message.is_empty()) {
            return Err(CoreError::Remote(message));
        }
        Ok(response.release)
    }

    /// Release name, or the tag when the release was published without one.
    pub fn version_name(&self) -> &str {
        if self.name.trim().is_empty() {
            &self.tag_name
        } else {
            &self.name
        }
    }

    pub fn find_asset(&self, name: &str) -> Option<&Asset> {
        self.assets.iter().find(|asset| asset.name == name)
    }
}

/// Picks the asset for `platform`/`cpu_tier` by exact file name.
pub fn select_asset<'a>(
    spec: &ChannelSpec,
    metadata: &'a ReleaseMetadata,
    remote_version: &str,
    platform: Platform,
    cpu_tier: Option<CpuTier>,
) -> CoreResult<&'a Asset> {
    let version = spec.asset_version(metadata.version_name(), remote_version);
    let expected = spec.asset_file_name(version, platform, cpu_tier);
    metadata
        .find_asset(&expected)
        .ok_or(CoreError::AssetNotFound { expected })
}

pub fn requires_risk_confirmation(asset: &Asset) -> bool {
    asset.uploader.kind != UploaderKind::Bot
}
