use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;
use std::time::Duration;

use coreup_core::{CoreError, CoreResult};
use tracing::debug;

use crate::cancel::CancelToken;

pub const USER_AGENT: &str = concat!("coreup/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadProgress {
    pub downloaded: u64,
    /// Missing when the server streams without a content length.
    pub total: Option<u64>,
}

impl DownloadProgress {
    pub fn percent(&self) -> Option<f64> {
        self.total
            .filter(|total| *total > 0)
            .map(|total| (self.downloaded as f64 / total as f64) * 100.0)
    }
}

/// HTTP operations the manager needs from the network.
pub trait ReleaseTransport: Send + Sync {
    /// Fetches `url` and returns the body as text.
    fn get_text(&self, url: &str, headers: &[(&str, String)]) -> CoreResult<String>;

    /// Streams `url` into `dest`, reporting byte progress.
    ///
    /// Returns `CoreError::UserCancelled` once `cancel` fires. The partially
    /// written file is left for the caller to remove.
    fn download_to_file(
        &self,
        url: &str,
        dest: &Path,
        progress: &mut dyn FnMut(DownloadProgress),
        cancel: &CancelToken,
    ) -> CoreResult<()>;
}

#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
}

impl ReqwestTransport {
    pub fn new() -> CoreResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(15))
            .timeout(None)
            .build()
            .map_err(|err| CoreError::Remote(format!("failed to build HTTP client: {err}")))?;
        Ok(Self { client })
    }
}

impl ReleaseTransport for ReqwestTransport {
    fn get_text(&self, url: &str, headers: &[(&str, String)]) -> CoreResult<String> {
        let mut request = self.client.get(url);
        for (name, value) in headers {
            request = request.header(*name, value);
        }
        let response = request
            .send()
            .map_err(|err| CoreError::Remote(format!("request to {url} failed: {err}")))?;
        let status = response.status();
        let body = response
            .text()
            .map_err(|err| CoreError::Remote(format!("failed to read body from {url}: {err}")))?;
        if !status.is_success() {
            return Err(CoreError::Remote(describe_error_body(url, status, &body)));
        }
        Ok(body)
    }

    fn download_to_file(
        &self,
        url: &str,
        dest: &Path,
        progress: &mut dyn FnMut(DownloadProgress),
        cancel: &CancelToken,
    ) -> CoreResult<()> {
        let mut response = self
            .client
            .get(url)
            .send()
            .map_err(|err| CoreError::Download(format!("request to {url} failed: {err}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(CoreError::Download(format!("{url} returned {status}")));
        }

        let total = response.content_length();
        debug!(url, ?total, dest = %dest.display(), "streaming download");
        let file = File::create(dest).map_err(|err| {
            CoreError::Download(format!("failed to create {}: {err}", dest.display()))
        })?;
        let mut writer = BufWriter::new(file);
        copy_with_progress(&mut response, &mut writer, total, progress, cancel)?;
        writer.flush().map_err(|err| {
            CoreError::Download(format!("failed to flush {}: {err}", dest.display()))
        })
    }
}

/// Copies `reader` into `writer` in chunks, checking `cancel` between chunks.
pub(crate) fn copy_with_progress(
    reader: &mut dyn Read,
    writer: &mut dyn Write,
    total: Option<u64>,
    progress: &mut dyn FnMut(DownloadProgress),
    cancel: &CancelToken,
) -> CoreResult<u64> {
    let mut buf = [0_u8; 64 * 1024];
    let mut downloaded = 0_u64;
    progress(DownloadProgress { downloaded, total });
    loop {
        if cancel.is_cancelled() {
            return Err(CoreError::UserCancelled);
        }
        let read = reader
            .read(&mut buf)
            .map_err(|err| CoreError::Download(format!("connection interrupted: {err}")))?;
        if read == 0 {
            break;
        }
        writer
            .write_all(&buf[..read])
            .map_err(|err| CoreError::Download(format!("failed to write download: {err}")))?;
        downloaded += read as u64;
        progress(DownloadProgress { downloaded, total });
    }
    Ok(downloaded)
}

fn describe_error_body(url: &str, status: reqwest::StatusCode, body: &str) -> String {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("message")
                .and_then(|message| message.as_str())
                .map(str::to_string)
        });
    match message {
        Some(message) => message,
        None => format!("{url} returned {status}"),
    }
}
