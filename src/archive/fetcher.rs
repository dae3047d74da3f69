//! Input fetching.

use crate::client::http::classify_status;
use crate::error::AnalystError;

use async_trait::async_trait;
use std::time::Duration;

const FETCH_TIMEOUT: Duration = Duration::from_secs(120);

/// Downloads the bytes behind an input URL.
#[async_trait]
pub trait InputFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, AnalystError>;
}

pub struct HttpFetcher {
    http_client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self::with_http_client(reqwest::Client::new())
    }

    pub fn with_http_client(http_client: reqwest::Client) -> Self {
        Self { http_client }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InputFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, AnalystError> {
        let response = self
            .http_client
            .get(url)
            .timeout(FETCH_TIMEOUT)
            .send()
            .await?;

        if let Some(err) = classify_status(&response) {
            return Err(err);
        }

        let bytes = response.bytes().await?;
        tracing::debug!("Fetched {} ({} bytes)", url, bytes.len());
        Ok(bytes.to_vec())
    }
}
