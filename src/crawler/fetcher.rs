//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler:
//! - Building HTTP clients with proper user agent strings and timeouts
//! - GET requests for listing, detail and chapter pages
//! - Folding every failure into a single `FetchError`
//!
//! There is no retry or caching here; a failed page is simply picked up
//! again by the next crawl cycle.

use crate::config::UserAgentConfig;
use crate::FetchError;
use reqwest::{redirect::Policy, Client};
use std::time::Duration;

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The user agent configuration
/// * `timeout` - Total per-request timeout
///
/// # Example
///
/// ```no_run
/// use novel_crawler::config::UserAgentConfig;
/// use novel_crawler::crawler::build_http_client;
/// use std::time::Duration;
///
/// let config = UserAgentConfig {
///     crawler_name: "NovelBot".to_string(),
///     crawler_version: "1.0".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
///
/// let client = build_http_client(&config, Duration::from_secs(30)).unwrap();
/// ```
pub fn build_http_client(
    config: &UserAgentConfig,
    timeout: Duration,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.header_value())
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Retrieves pages by URL
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    /// Creates a fetcher with a freshly built client
    pub fn new(config: &UserAgentConfig, timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self::from_client(build_http_client(config, timeout)?))
    }

    /// Wraps an existing client
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    /// Fetches a page and returns its body
    ///
    /// # Error Classification
    ///
    /// | Condition | Cause |
    /// |-----------|-------|
    /// | Non-2xx status | `HTTP <code>` |
    /// | Timeout | `request timed out` |
    /// | Connection failure | `connection failed: ...` |
    /// | Body cannot be read | `failed to read body: ...` |
    ///
    /// All of them are returned as `FetchError { url, cause }`.
    pub async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        tracing::debug!(url, "Fetching page");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| fetch_error(url, classify(&e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(fetch_error(url, format!("HTTP {}", status.as_u16())));
        }

        response
            .text()
            .await
            .map_err(|e| fetch_error(url, format!("failed to read body: {}", e)))
    }
}

fn classify(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        "request timed out".to_string()
    } else if error.is_connect() {
        format!("connection failed: {}", error)
    } else if error.is_redirect() {
        format!("redirect error: {}", error)
    } else {
        error.to_string()
    }
}

fn fetch_error(url: &str, cause: String) -> FetchError {
    FetchError {
        url: url.to_string(),
        cause,
    }
}
