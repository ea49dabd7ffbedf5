use coreup_core::{ChannelSpec, CoreResult, ReleaseMetadata};
use tracing::debug;

use crate::transport::ReleaseTransport;

/// Headers for metadata requests. The token only raises API rate limits.
pub fn authorization_headers(token: Option<&str>) -> Vec<(&'static str, String)> {
    let mut headers = vec![("Accept", "application/vnd.github+json".to_string())];
    if let Some(token) = token.map(str::trim).filter(|token| !token.is_empty()) {
        headers.push(("Authorization", format!("Bearer {token}")));
    }
    headers
}

pub fn fetch_release(
    transport: &dyn ReleaseTransport,
    spec: &ChannelSpec,
    token: Option<&str>,
) -> CoreResult<ReleaseMetadata> {
    let body = transport.get_text(&spec.metadata_url, &authorization_headers(token))?;
    ReleaseMetadata::parse(&body)
}

/// Latest version published on a channel.
///
/// A plain-text version file is preferred when the channel has one; otherwise
/// the release name from the metadata endpoint is used.
pub fn resolve_remote_version(
    transport: &dyn ReleaseTransport,
    spec: &ChannelSpec,
    token: Option<&str>,
) -> CoreResult<String> {
    if let Some(url) = &spec.version_file_url {
        debug!(url, "reading version file");
        let body = transport.get_text(url, &[])?;
        return Ok(body.trim().to_string());
    }

    let release = fetch_release(transport, spec, token)?;
    Ok(release.version_name().to_string())
}
