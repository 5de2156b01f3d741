use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use thiserror::Error;
use tracing::debug;
use url::Url;

#[derive(Debug, Error)]
pub enum DownloadError {
    /// The server answered with a non-success status (e.g. "404 Not Found").
    #[error("download failed: {0}")]
    Status(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("read failed: {0}")]
    Read(String),

    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("unsupported url scheme: {0}")]
    UnsupportedScheme(String),
}

/// Fetches the bytes behind a retrieval URL.
#[async_trait]
pub trait Downloader: Send + Sync {
    async fn download(&self, url: &str) -> Result<Bytes, DownloadError>;
}

/// Downloads `http(s)://` URLs with reqwest and reads `file://` URLs from disk.
///
/// No retries. Without a timeout a stalled transfer waits indefinitely.
pub struct UrlDownloader {
    client: Client,
    timeout: Option<Duration>,
}

impl Default for UrlDownloader {
    fn default() -> Self {
        Self::new()
    }
}

impl UrlDownloader {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            timeout: None,
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            timeout: Some(timeout),
        }
    }

    async fn download_http(&self, url: Url) -> Result<Bytes, DownloadError> {
        let mut builder = self.client.get(url);
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        let resp = builder
            .send()
            .await
            .map_err(|e| DownloadError::Transport(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(DownloadError::Status(status.to_string()));
        }
        resp.bytes()
            .await
            .map_err(|e| DownloadError::Transport(format!("read body: {e}")))
    }

    async fn download_file(&self, url: &Url) -> Result<Bytes, DownloadError> {
        let path = url
            .to_file_path()
            .map_err(|_| DownloadError::InvalidUrl(url.to_string()))?;
        tokio::fs::read(&path)
            .await
            .map(Bytes::from)
            .map_err(|e| DownloadError::Read(format!("{}: {e}", path.display())))
    }
}

#[async_trait]
impl Downloader for UrlDownloader {
    async fn download(&self, url: &str) -> Result<Bytes, DownloadError> {
        let parsed = Url::parse(url).map_err(|e| DownloadError::InvalidUrl(format!("{url}: {e}")))?;
        debug!("downloading {parsed}");
        match parsed.scheme() {
            "http" | "https" => self.download_http(parsed).await,
            "file" => self.download_file(&parsed).await,
            other => Err(DownloadError::UnsupportedScheme(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn file_url_reads_bytes() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("photo.jpg");
        std::fs::write(&path, b"jpeg bytes").unwrap();
        let url = Url::from_file_path(&path).unwrap();

        let data = UrlDownloader::new().download(url.as_str()).await.unwrap();
        assert_eq!(data.as_ref(), b"jpeg bytes");
    }

    #[tokio::test]
    async fn missing_file_is_read_error() {
        let tmp = tempfile::tempdir().unwrap();
        let url = Url::from_file_path(tmp.path().join("gone.png")).unwrap();
        let err = UrlDownloader::new().download(url.as_str()).await.unwrap_err();
        assert!(matches!(err, DownloadError::Read(_)));
    }

    #[tokio::test]
    async fn unsupported_scheme_is_rejected() {
        let err = UrlDownloader::new()
            .download("ftp://example.test/a.png")
            .await
            .unwrap_err();
        assert!(matches!(err, DownloadError::UnsupportedScheme(s) if s == "ftp"));
    }

    #[tokio::test]
    async fn garbage_url_is_invalid() {
        let err = UrlDownloader::new().download("not a url").await.unwrap_err();
        assert!(matches!(err, DownloadError::InvalidUrl(_)));
    }

    #[test]
    fn status_error_carries_status_text() {
        let err = DownloadError::Status(reqwest::StatusCode::NOT_FOUND.to_string());
        assert_eq!(err.to_string(), "download failed: 404 Not Found");
    }
}
