mod cancel;
mod resolve;
mod transport;

pub use cancel::CancelToken;
pub use resolve::{authorization_headers, fetch_release, resolve_remote_version};
pub use transport::{DownloadProgress, ReleaseTransport, ReqwestTransport, USER_AGENT};

#[cfg(test)]
mod tests;
