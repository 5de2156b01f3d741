use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Result};
use clap::Parser;
use reframe_core::TransformSpec;
use reframe_service::{StoreConfig, UrlDownloader};

#[derive(Debug, Parser)]
#[command(
    name = "reframe-runner",
    about = "Center-crop and scale image attachments to a fixed resolution"
)]
pub struct RunnerConfig {
    /// Host store URL
    #[arg(long, env = "REFRAME_SERVER_URL")]
    pub server_url: Option<String>,

    /// API key for authenticating with the host store
    #[arg(long, env = "REFRAME_API_KEY")]
    pub api_key: Option<String>,

    /// Use a directory tree as the host store instead of a server.
    #[arg(long, env = "REFRAME_LOCAL_DIR")]
    pub local_dir: Option<PathBuf>,

    /// Attachment field holding the originals
    #[arg(long, env = "REFRAME_SOURCE_FIELD")]
    pub source_field: Option<String>,

    /// Attachment field receiving the processed images
    #[arg(long, env = "REFRAME_TARGET_FIELD")]
    pub target_field: Option<String>,

    /// Target width in pixels
    #[arg(long, env = "REFRAME_WIDTH")]
    pub width: Option<u32>,

    /// Target height in pixels
    #[arg(long, env = "REFRAME_HEIGHT")]
    pub height: Option<u32>,

    /// Record to process. Repeatable; defaults to every record in the store.
    #[arg(long = "record")]
    pub records: Vec<String>,

    /// Per-download timeout (seconds). Unset means no timeout.
    #[arg(long, env = "REFRAME_DOWNLOAD_TIMEOUT")]
    pub download_timeout: Option<u64>,

    /// Write the run report as JSON to this path.
    #[arg(long)]
    pub summary_json: Option<PathBuf>,

    /// Print the store's attachment fields and exit.
    #[arg(long)]
    pub list_fields: bool,
}

impl RunnerConfig {
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            server_url: self.server_url.clone(),
            api_key: self.api_key.clone(),
            local_dir: self.local_dir.clone(),
        }
    }

    /// Both dimensions are required and must be positive.
    pub fn transform_spec(&self) -> Result<TransformSpec> {
        let width = self.width.ok_or_else(|| anyhow!("--width is required"))?;
        let height = self.height.ok_or_else(|| anyhow!("--height is required"))?;
        Ok(TransformSpec::new(width, height)?)
    }

    pub fn downloader(&self) -> UrlDownloader {
        match self.download_timeout {
            Some(secs) => UrlDownloader::with_timeout(Duration::from_secs(secs)),
            None => UrlDownloader::new(),
        }
    }
}
