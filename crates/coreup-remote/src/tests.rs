use super::*;
use crate::transport::copy_with_progress;

use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;
use std::sync::Mutex;

use coreup_core::{Channel, CoreError, CoreResult};

#[derive(Default)]
struct RecordingTransport {
    bodies: HashMap<String, String>,
    requests: Mutex<Vec<(String, Vec<(String, String)>)>>,
}

impl RecordingTransport {
    fn with(mut self, url: &str, body: &str) -> Self {
        self.bodies.insert(url.to_string(), body.to_string());
        self
    }

    fn requested_urls(&self) -> Vec<String> {
        self.requests
            .lock()
            .expect("requests lock")
            .iter()
            .map(|(url, _)| url.clone())
            .collect()
    }
}

impl ReleaseTransport for RecordingTransport {
    fn get_text(&self, url: &str, headers: &[(&str, String)]) -> CoreResult<String> {
        self.requests.lock().expect("requests lock").push((
            url.to_string(),
            headers
                .iter()
                .map(|(name, value)| (name.to_string(), value.clone()))
                .collect(),
        ));
        self.bodies
            .get(url)
            .cloned()
            .ok_or_else(|| CoreError::Remote(format!("no route for {url}")))
    }

    fn download_to_file(
        &self,
        _url: &str,
        _dest: &Path,
        _progress: &mut dyn FnMut(DownloadProgress),
        _cancel: &CancelToken,
    ) -> CoreResult<()> {
        unreachable!("downloads are not used by resolution tests")
    }
}

#[test]
fn remote_version_prefers_version_file() {
    let spec = Channel::Alpha.spec();
    let transport = RecordingTransport::default().with(
        spec.version_file_url.as_deref().expect("alpha has version file"),
        "alpha-1a2b3c4\n",
    );

    let version = resolve_remote_version(&transport, &spec, Some("secret")).expect("must resolve");
    assert_eq!(version, "alpha-1a2b3c4");
    assert_eq!(
        transport.requested_urls(),
        vec![spec.version_file_url.clone().expect("version file")]
    );
}

#[test]
fn remote_version_falls_back_to_release_name_with_authorization() {
    let spec = Channel::Stable.spec();
    let transport = RecordingTransport::default().with(
        &spec.metadata_url,
        r#"{"name":"v1.19.0","tag_name":"v1.19.0","assets":[]}"#,
    );

    let version =
        resolve_remote_version(&transport, &spec, Some("ghp_token")).expect("must resolve");
    assert_eq!(version, "v1.19.0");

    let requests = transport.requests.lock().expect("requests lock");
    let (_, headers) = &requests[0];
    assert!(headers
        .iter()
        .any(|(name, value)| name == "Authorization" && value == "Bearer ghp_token"));
}

#[test]
fn remote_version_uses_tag_when_release_is_unnamed() {
    let spec = Channel::Stable.spec();
    let transport = RecordingTransport::default().with(
        &spec.metadata_url,
        r#"{"name":"  ","tag_name":"v1.19.1","assets":[]}"#,
    );

    let version = resolve_remote_version(&transport, &spec, None).expect("must resolve");
    assert_eq!(version, "v1.19.1");
}

#[test]
fn remote_version_surfaces_api_message() {
    let spec = Channel::Stable.spec();
    let transport = RecordingTransport::default()
        .with(&spec.metadata_url, r#"{"message":"Not Found"}"#);

    let err = resolve_remote_version(&transport, &spec, None).expect_err("message must fail");
    assert!(matches!(err, CoreError::Remote(ref message) if message == "Not Found"));
}

#[test]
fn remote_version_propagates_network_failure() {
    let spec = Channel::Smart.spec();
    let transport = RecordingTransport::default();
    let err = resolve_remote_version(&transport, &spec, None).expect_err("no route");
    assert!(err.is_resolution_error());
}

#[test]
fn authorization_headers_skip_blank_token() {
    assert_eq!(authorization_headers(None).len(), 1);
    assert_eq!(authorization_headers(Some("  ")).len(), 1);
    assert_eq!(authorization_headers(Some("abc")).len(), 2);
}

#[test]
fn copy_with_progress_reports_every_chunk() {
    let payload = vec![7_u8; 150 * 1024];
    let mut reader = Cursor::new(payload.clone());
    let mut out = Vec::new();
    let mut seen = Vec::new();

    let copied = copy_with_progress(
        &mut reader,
        &mut out,
        Some(payload.len() as u64),
        &mut |progress| seen.push(progress),
        &CancelToken::new(),
    )
    .expect("must copy");

    assert_eq!(copied, payload.len() as u64);
    assert_eq!(out, payload);
    assert_eq!(seen.first().map(|p| p.downloaded), Some(0));
    assert_eq!(
        seen.last().and_then(DownloadProgress::percent),
        Some(100.0)
    );
}

#[test]
fn copy_with_progress_stops_when_cancelled() {
    let cancel = CancelToken::new();
    let observer = cancel.clone();
    let mut reader = Cursor::new(vec![1_u8; 256 * 1024]);
    let mut out = Vec::new();

    let err = copy_with_progress(
        &mut reader,
        &mut out,
        None,
        &mut |progress| {
            if progress.downloaded > 0 {
                observer.cancel();
            }
        },
        &cancel,
    )
    .expect_err("must cancel");

    assert!(err.is_user_cancelled());
    assert!(out.len() < 256 * 1024);
}

#[test]
fn progress_percent_requires_known_total() {
    let progress = DownloadProgress {
        downloaded: 5,
        total: None,
    };
    assert_eq!(progress.percent(), None);
    let progress = DownloadProgress {
        downloaded: 5,
        total: Some(10),
    };
    assert_eq!(progress.percent(), Some(50.0));
}
