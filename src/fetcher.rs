//! Fetch and parse gateway.
//!
//! Uses reqwest for fetching and scraper for HTML parsing. Extractors only see
//! the [`Fetcher`] trait, so tests can serve canned pages.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use scraper::Html;
use thiserror::Error;

/// User-Agent string identifying this scraper
pub const USER_AGENT: &str = concat!(
    "Mozilla/5.0 (compatible; bbcast/",
    env!("CARGO_PKG_VERSION"),
    ")"
);

/// Default timeout for HTTP requests
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("failed to fetch {url}: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("no page at {0}")]
    NotFound(String),
}

/// Returns the raw markup behind a URL. Non-2xx responses are errors.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// Parse markup leniently; malformed HTML never fails.
pub fn parse(html: &str) -> Html {
    Html::parse_document(html)
}

/// reqwest-backed fetcher with a bounded per-request timeout.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, FetchError> {
        Self::with_settings(REQUEST_TIMEOUT, USER_AGENT)
    }

    pub fn with_settings(timeout: Duration, user_agent: &str) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(FetchError::Client)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let request_error = |source| FetchError::Request {
            url: url.to_string(),
            source,
        };
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(request_error)?;
        response.text().await.map_err(request_error)
    }
}

/// Serves pages from memory. Unknown URLs fail like a 404.
#[derive(Debug, Default, Clone)]
pub struct StaticFetcher {
    pages: HashMap<String, String>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_string(), html.to_string());
        self
    }
}

#[async_trait]
impl Fetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::NotFound(url.to_string()))
    }
}
