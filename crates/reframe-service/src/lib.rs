mod download;
mod http;
mod local;
pub mod mock;
mod traits;

pub use download::{DownloadError, Downloader, UrlDownloader};
pub use http::HttpHostStore;
pub use local::LocalHostStore;
pub use traits::{HostStore, ServiceError};

use std::path::PathBuf;
use std::sync::Arc;

// -- Configuration --

/// Which host store backend to talk to.
#[derive(Debug, Clone, Default)]
pub struct StoreConfig {
    /// Base URL of a host store speaking the REST contract (e.g. "http://127.0.0.1:3720").
    pub server_url: Option<String>,
    /// Bearer token sent with every request to `server_url`.
    pub api_key: Option<String>,
    /// Directory tree used instead of a server. Takes precedence over `server_url`.
    pub local_dir: Option<PathBuf>,
}

// -- Factory --

/// Create a `HostStore` from configuration.
pub fn create_store(config: &StoreConfig) -> Result<Arc<dyn HostStore>, ServiceError> {
    if let Some(dir) = &config.local_dir {
        return Ok(Arc::new(LocalHostStore::new(dir.clone())));
    }
    match &config.server_url {
        Some(url) => Ok(Arc::new(match &config.api_key {
            Some(key) => HttpHostStore::with_api_key(url, key.clone()),
            None => HttpHostStore::new(url),
        })),
        None => Err(ServiceError::InvalidInput(
            "no host store configured: set a server URL or a local directory".into(),
        )),
    }
}
