//! Fetcher capability and the bundled implementations

use crate::{Error, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, trace};
use url::Url;

/// Settings passed to every fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOptions {
    /// Permit reading plain paths and `file:` URLs
    pub allow_local_paths: bool,

    /// Replace the host of remote URLs
    pub force_host: Option<String>,

    /// Replace the port of remote URLs
    pub force_port: Option<u16>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            allow_local_paths: true,
            force_host: None,
            force_port: None,
        }
    }
}

impl FetchOptions {
    /// Apply the host and port overrides to a remote URL
    pub fn rewrite_url(&self, url: &str) -> String {
        if self.force_host.is_none() && self.force_port.is_none() {
            return url.to_string();
        }

        let Ok(mut parsed) = Url::parse(url) else {
            return url.to_string();
        };
        if !matches!(parsed.scheme(), "http" | "https") {
            return url.to_string();
        }

        if let Some(host) = &self.force_host {
            if parsed.set_host(Some(host)).is_err() {
                return url.to_string();
            }
        }
        if let Some(port) = self.force_port {
            if parsed.set_port(Some(port)).is_err() {
                return url.to_string();
            }
        }
        parsed.into()
    }
}

/// A fetched schema document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedDocument {
    /// URL the document is known under (used to resolve relative locations)
    pub url: String,
    pub text: String,
}

/// Resolves a URL or path to document text
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str, options: &FetchOptions) -> Result<FetchedDocument>;
}

fn is_url(location: &str) -> bool {
    // Single-letter schemes are Windows drive letters
    Url::parse(location).is_ok_and(|url| url.scheme().len() > 1)
}

fn is_remote(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

/// Resolve a `schemaLocation` against the URL of the document holding it
pub fn resolve_location(base: &str, location: &str) -> String {
    if is_url(location) {
        return location.to_string();
    }

    if is_url(base) {
        if let Ok(joined) = Url::parse(base).and_then(|url| url.join(location)) {
            return joined.into();
        }
    }

    let joined = Path::new(base)
        .parent()
        .map_or_else(|| PathBuf::from(location), |dir| dir.join(location));
    normalize(&joined)
}

/// Lexically remove `.` and `..` components
fn normalize(path: &Path) -> String {
    let mut parts: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match parts.last() {
                Some(Component::Normal(_)) => {
                    parts.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => parts.push(component),
            },
            other => parts.push(other),
        }
    }

    let normalized: PathBuf = parts.iter().collect();
    normalized.to_string_lossy().replace('\\', "/")
}

/// Reads plain paths and `file:` URLs from disk
#[derive(Debug, Clone, Default)]
pub struct FileFetcher;

#[async_trait]
impl Fetcher for FileFetcher {
    async fn fetch(&self, url: &str, options: &FetchOptions) -> Result<FetchedDocument> {
        if !options.allow_local_paths {
            return Err(Error::fetch(url, "local paths are disabled"));
        }

        let path = if url.starts_with("file:") {
            Url::parse(url)
                .ok()
                .and_then(|parsed| parsed.to_file_path().ok())
                .ok_or_else(|| Error::fetch(url, "invalid file URL"))?
        } else {
            PathBuf::from(url)
        };

        debug!("Reading schema from {}", path.display());
        let text = tokio::fs::read_to_string(&path)
            .await
            .map_err(|err| Error::fetch(url, err.to_string()))?;

        Ok(FetchedDocument {
            url: url.to_string(),
            text,
        })
    }
}

/// Serves documents registered in memory and counts requests per URL
#[derive(Debug, Default)]
pub struct MemoryFetcher {
    documents: DashMap<String, String>,
    requests: DashMap<String, usize>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a document
    pub fn insert(&self, url: impl Into<String>, text: impl Into<String>) {
        self.documents.insert(url.into(), text.into());
    }

    /// Builder-style [`MemoryFetcher::insert`]
    #[must_use]
    pub fn with(self, url: impl Into<String>, text: impl Into<String>) -> Self {
        self.insert(url, text);
        self
    }

    /// How often a URL was requested
    pub fn fetch_count(&self, url: &str) -> usize {
        self.requests.get(url).map_or(0, |count| *count)
    }
}

#[async_trait]
impl Fetcher for MemoryFetcher {
    async fn fetch(&self, url: &str, _options: &FetchOptions) -> Result<FetchedDocument> {
        *self.requests.entry(url.to_string()).or_insert(0) += 1;

        let text = self
            .documents
            .get(url)
            .map(|text| text.value().clone())
            .ok_or_else(|| Error::fetch(url, "document not found"))?;

        Ok(FetchedDocument {
            url: url.to_string(),
            text,
        })
    }
}

/// Memoizes another fetcher's documents for the lifetime of the fetcher
pub struct CachingFetcher<F> {
    inner: F,
    cache: DashMap<String, FetchedDocument>,
}

impl<F: Fetcher> CachingFetcher<F> {
    pub fn new(inner: F) -> Self {
        Self {
            inner,
            cache: DashMap::new(),
        }
    }

    pub fn inner(&self) -> &F {
        &self.inner
    }

    /// Number of cached documents
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

#[async_trait]
impl<F: Fetcher> Fetcher for CachingFetcher<F> {
    async fn fetch(&self, url: &str, options: &FetchOptions) -> Result<FetchedDocument> {
        if let Some(cached) = self.cache.get(url) {
            trace!("Cache hit for {}", url);
            return Ok(cached.value().clone());
        }

        let document = self.inner.fetch(url, options).await?;
        self.cache.insert(url.to_string(), document.clone());
        Ok(document)
    }
}

/// Dispatches on the location: remote URLs over HTTP, everything else from disk
#[derive(Default)]
pub struct DefaultFetcher {
    file: FileFetcher,
    #[cfg(feature = "http")]
    http: Option<crate::http::HttpFetcher>,
}

impl DefaultFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a configured HTTP fetcher for remote locations
    #[cfg(feature = "http")]
    #[must_use]
    pub fn with_http(mut self, http: crate::http::HttpFetcher) -> Self {
        self.http = Some(http);
        self
    }
}

impl DefaultFetcher {
    #[cfg(feature = "http")]
    async fn fetch_remote(&self, url: &str, options: &FetchOptions) -> Result<FetchedDocument> {
        match &self.http {
            Some(http) => http.fetch(url, options).await,
            None => crate::http::HttpFetcher::new()?.fetch(url, options).await,
        }
    }

    #[cfg(not(feature = "http"))]
    async fn fetch_remote(&self, url: &str, _options: &FetchOptions) -> Result<FetchedDocument> {
        Err(Error::fetch(url, "remote schemas need the `http` feature"))
    }
}

#[async_trait]
impl Fetcher for DefaultFetcher {
    async fn fetch(&self, url: &str, options: &FetchOptions) -> Result<FetchedDocument> {
        if is_remote(url) {
            self.fetch_remote(url, options).await
        } else {
            self.file.fetch(url, options).await
        }
    }
}
