//! Payload fetching
//!
//! [`Fetcher`] is the seam between the pipeline and the outside world;
//! [`NetFetcher`] serves `http(s)` through `reqwest`, decodes `data:` URIs in
//! process and reads `file:` URIs from disk.

use crate::data_url::decode_data_url;
use crate::error::FetchError;
use async_trait::async_trait;
use picpick_resource::ResourceKey;
use std::time::Duration;
use url::Url;

/// Fetched bytes plus the content type the source declared
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetched {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// Source of payload bytes
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch the resource behind a key
    async fn fetch(&self, key: &ResourceKey) -> Result<Fetched, FetchError>;
}

/// HTTP client settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchSettings {
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: concat!("picpick/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Network, inline and local-file fetcher
#[derive(Debug, Clone)]
pub struct NetFetcher {
    client: reqwest::Client,
}

impl NetFetcher {
    /// Build a fetcher with the given client settings
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be constructed
    pub fn new(settings: &FetchSettings) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .user_agent(settings.user_agent.clone())
            .build()?;
        Ok(Self { client })
    }

    async fn fetch_http(&self, url: Url) -> Result<Fetched, FetchError> {
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                uri: url.to_string(),
                status: status.as_u16(),
            });
        }
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await?.to_vec();
        Ok(Fetched { bytes, content_type })
    }
}

#[async_trait]
impl Fetcher for NetFetcher {
    async fn fetch(&self, key: &ResourceKey) -> Result<Fetched, FetchError> {
        if key.is_data_uri() {
            return decode_data_url(key.as_str());
        }
        let url = Url::parse(key.as_str()).map_err(|_| FetchError::InvalidUri(key.to_string()))?;
        tracing::debug!(%url, "fetching");
        match url.scheme() {
            "http" | "https" => self.fetch_http(url).await,
            "file" => {
                let path = url
                    .to_file_path()
                    .map_err(|()| FetchError::InvalidUri(key.to_string()))?;
                let bytes = tokio::fs::read(path).await?;
                Ok(Fetched {
                    bytes,
                    content_type: None,
                })
            }
            _ => Err(FetchError::UnsupportedScheme(key.to_string())),
        }
    }
}
