//! HTTP client wrapper for fetching images.
//!
//! This module provides the `HttpClient` struct which issues GET requests with
//! the configured timeout and the tool's User-Agent. Status codes are *not*
//! turned into errors here; the validator decides what a non-200 means.

use std::time::Duration;

use reqwest::Client;
use tracing::{debug, instrument};
use url::Url;

use super::constants::CONNECT_TIMEOUT_SECS;
use super::error::DownloadError;
use crate::config::DEFAULT_TIMEOUT_SECS;
use crate::user_agent;

/// HTTP client for fetching images with streaming support.
///
/// Created once per run and reused for every URL, taking advantage of
/// connection pooling.
///
/// # Example
///
/// ```no_run
/// use image_fetcher_core::download::HttpClient;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = HttpClient::new();
/// let response = client.get("https://example.com/cat.png").await?;
/// println!("status: {}", response.status());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    timeout: Duration,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient {
    /// Creates a new HTTP client with the default 15 second timeout.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build with the static
    /// configuration. This should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .expect("failed to build HTTP client with static configuration")
    }

    /// Creates a new HTTP client with an explicit per-request timeout.
    ///
    /// The connect phase is additionally capped at 10 seconds.
    ///
    /// # Errors
    ///
    /// Returns the builder error if the TLS backend cannot be initialized.
    pub fn with_timeout(timeout: Duration) -> Result<Self, reqwest::Error> {
        let connect_timeout = timeout.min(Duration::from_secs(CONNECT_TIMEOUT_SECS));
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(timeout)
            .gzip(true)
            .user_agent(user_agent::default_fetch_user_agent())
            .build()?;
        Ok(Self { client, timeout })
    }

    /// Per-request timeout this client was built with.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Sends a GET request and returns the response with its body unread.
    ///
    /// Redirects are followed. Any status code is returned as `Ok`.
    ///
    /// # Errors
    ///
    /// Returns `DownloadError` if:
    /// - The URL is invalid or not http/https
    /// - The request fails (DNS, connection refused, TLS)
    /// - The request times out
    #[instrument(skip(self), fields(url = %url))]
    pub async fn get(&self, url: &str) -> Result<reqwest::Response, DownloadError> {
        let parsed = parse_fetch_url(url)?;
        self.get_url(parsed).await
    }

    /// Sends a GET request for a URL already checked by [`parse_fetch_url`].
    ///
    /// # Errors
    ///
    /// Returns `DownloadError` if the request fails or times out.
    pub(crate) async fn get_url(&self, url: Url) -> Result<reqwest::Response, DownloadError> {
        let url_text = url.to_string();
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| DownloadError::network(url_text, e))?;

        debug!(
            status = response.status().as_u16(),
            final_url = %response.url(),
            "response received"
        );
        Ok(response)
    }
}

/// Parses and checks that `url` is an absolute http(s) URL.
pub(crate) fn parse_fetch_url(url: &str) -> Result<Url, DownloadError> {
    let parsed = Url::parse(url.trim()).map_err(|_| DownloadError::invalid_url(url))?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err(DownloadError::invalid_url(url));
    }
    Ok(parsed)
}
