//! HTTP fetcher (`http` feature)

use crate::fetch::{FetchOptions, FetchedDocument, Fetcher};
use crate::{Error, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Fetches remote schema documents with `reqwest`
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Client with the default request timeout
    pub fn new() -> Result<Self> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| Error::fetch("<client>", err.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str, options: &FetchOptions) -> Result<FetchedDocument> {
        let target = options.rewrite_url(url);
        debug!("GET {}", target);

        let response = self
            .client
            .get(&target)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|err| Error::fetch(url, err.to_string()))?;
        let text = response
            .text()
            .await
            .map_err(|err| Error::fetch(url, err.to_string()))?;

        // Keep the requested URL so relative locations and dedup use the same key
        Ok(FetchedDocument {
            url: url.to_string(),
            text,
        })
    }
}
