//! Image downloads for kept search results.
//!
//! Downloads are a side effect of collection: a failed image never fails
//! the run, it is logged and skipped.

use reqwest::Client;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, info, instrument};
use url::Url;

use crate::error::Result;

pub const IMAGES_DIR: &str = "images";

/// Fetches an image to a named destination.
pub trait ImageDownloader {
    /// Download `url` and store it as `file_name`. Failures are handled
    /// (logged) by the implementation.
    async fn download(&self, url: &str, file_name: &str);
}

/// Downloads over HTTP into `<output_dir>/images/`.
#[derive(Debug, Clone)]
pub struct HttpImageDownloader {
    client: Client,
    base_url: Url,
    dir: PathBuf,
}

impl HttpImageDownloader {
    /// `base_url` resolves relative `src` values.
    pub fn new(base_url: &str, output_dir: &Path) -> std::result::Result<Self, url::ParseError> {
        Ok(Self {
            client: Client::new(),
            base_url: Url::parse(base_url)?,
            dir: output_dir.join(IMAGES_DIR),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Absolute form of an image `src`.
    pub fn resolve(&self, src: &str) -> std::result::Result<Url, url::ParseError> {
        self.base_url.join(src)
    }

    /// Fetch and write one image, overwriting any previous file.
    async fn fetch(&self, url: &str, file_name: &str) -> Result<PathBuf> {
        let url = self.resolve(url).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidInput, format!("bad image url: {e}"))
        })?;
        let bytes = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;

        fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(file_name);
        fs::write(&path, &bytes).await?;
        Ok(path)
    }
}

impl ImageDownloader for HttpImageDownloader {
    #[instrument(level = "info", skip(self))]
    async fn download(&self, url: &str, file_name: &str) {
        match self.fetch(url, file_name).await {
            Ok(path) => info!(path = %path.display(), "Saved image"),
            Err(e) => error!(error = %e, "Image download failed"),
        }
    }
}
