//! Render service client.
//!
//! The render service turns an [`AvatarRequest`] into an image. PNG output is
//! handed to the chat platform as a URL; other formats are downloaded here
//! and sent as a file.

use crate::avatar::AvatarRequest;
use crate::config::RenderConfig;
use crate::error::{RenderError, RenderResult};
use async_trait::async_trait;
use reqwest::Url;
use std::time::Duration;
use tracing::{debug, warn};

/// Image generation backend.
#[async_trait]
pub trait RenderService: Send + Sync {
    /// URL the image can be downloaded from.
    fn image_url(&self, request: &AvatarRequest) -> RenderResult<Url>;

    /// Download the rendered image bytes.
    async fn fetch(&self, request: &AvatarRequest) -> RenderResult<Vec<u8>>;
}

/// HTTP client for the DiceBear API.
#[derive(Debug, Clone)]
pub struct DiceBearClient {
    http: reqwest::Client,
    base_url: String,
}

impl DiceBearClient {
    /// Create a client from configuration.
    pub fn from_config(config: &RenderConfig) -> RenderResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RenderError::Request(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.base_url.clone(),
        })
    }

    /// The configured base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl RenderService for DiceBearClient {
    fn image_url(&self, request: &AvatarRequest) -> RenderResult<Url> {
        request.url(&self.base_url)
    }

    async fn fetch(&self, request: &AvatarRequest) -> RenderResult<Vec<u8>> {
        let url = self.image_url(request)?;
        debug!(%url, "fetching avatar");

        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "render service rejected request");
            return Err(RenderError::Status(status.as_u16()));
        }

        let bytes = response.bytes().await?;
        debug!(len = bytes.len(), "avatar fetched");
        Ok(bytes.to_vec())
    }
}
