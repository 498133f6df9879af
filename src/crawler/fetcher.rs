//! HTTP fetcher implementation
//!
//! This module handles all page requests for the crawler, including:
//! - Building the HTTP client with the identifying user agent
//! - Bounded GET requests (body truncated at a configured byte cap)
//! - Content-Type normalization
//!
//! Fetch failures are returned as data inside [`PageResult`], never as errors.

use crate::config::{CrawlerConfig, UserAgentConfig};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Result of fetching one page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageResult {
    /// The URL that was requested
    pub url: String,
    /// Body text, truncated at the byte cap; empty on failure
    pub html: String,
    /// Media type without parameters, lowercase; empty if unknown
    pub content_type: String,
    /// Transport error, if the request failed
    pub error: Option<String>,
}

impl PageResult {
    /// Builds a failed result with an empty body
    pub fn failed(url: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            html: String::new(),
            content_type: String::new(),
            error: Some(error.into()),
        }
    }

    /// Returns true if links may be extracted from this page
    pub fn is_html(&self) -> bool {
        self.error.is_none() && self.content_type.starts_with("text/html")
    }
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `user_agent` - The user agent configuration
/// * `timeout` - Overall timeout of a single request
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use crawl_relay::config::UserAgentConfig;
/// use crawl_relay::crawler::build_http_client;
/// use std::time::Duration;
///
/// let config = UserAgentConfig {
///     crawler_name: "CrawlRelay".to_string(),
///     crawler_version: "1.0".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
///
/// let client = build_http_client(&config, Duration::from_secs(20)).unwrap();
/// ```
pub fn build_http_client(
    user_agent: &UserAgentConfig,
    timeout: Duration,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent.header_value())
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .pool_max_idle_per_host(128)
        .pool_idle_timeout(Duration::from_secs(90))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches pages for seed crawls
#[derive(Debug, Clone)]
pub struct PageFetcher {
    client: Client,
    max_page_bytes: usize,
}

impl PageFetcher {
    pub fn new(client: Client, max_page_bytes: usize) -> Self {
        Self {
            client,
            max_page_bytes,
        }
    }

    /// Builds a fetcher from configuration
    pub fn from_config(
        crawler: &CrawlerConfig,
        user_agent: &UserAgentConfig,
    ) -> Result<Self, reqwest::Error> {
        let client = build_http_client(
            user_agent,
            Duration::from_secs(crawler.request_timeout_secs),
        )?;
        Ok(Self::new(client, crawler.max_page_bytes))
    }

    /// Fetches a URL with a single bounded GET
    ///
    /// # Request Flow
    ///
    /// 1. Send GET; a transport failure yields a result with `error` set
    /// 2. Normalize Content-Type (lowercase, parameters stripped)
    /// 3. Read the body chunk by chunk, stopping at the byte cap
    ///
    /// Non-2xx responses are not errors here: their body is recorded like any
    /// other page.
    pub async fn fetch_page(&self, url: &str) -> PageResult {
        let mut response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!("Fetch failed for {}: {}", url, e);
                return PageResult::failed(url, describe_error(&e));
            }
        };

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(normalize_content_type)
            .unwrap_or_default();

        let mut body: Vec<u8> = Vec::new();
        loop {
            match response.chunk().await {
                Ok(Some(chunk)) => {
                    let remaining = self.max_page_bytes.saturating_sub(body.len());
                    if chunk.len() >= remaining {
                        body.extend_from_slice(&chunk[..remaining]);
                        tracing::debug!(
                            "Truncated body of {} at {} bytes",
                            url,
                            self.max_page_bytes
                        );
                        break;
                    }
                    body.extend_from_slice(&chunk);
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::debug!("Body read failed for {}: {}", url, e);
                    return PageResult {
                        url: url.to_string(),
                        html: String::new(),
                        content_type,
                        error: Some(describe_error(&e)),
                    };
                }
            }
        }

        tracing::trace!("Fetched {} ({} bytes, {})", url, body.len(), content_type);

        PageResult {
            url: url.to_string(),
            html: String::from_utf8_lossy(&body).into_owned(),
            content_type,
            error: None,
        }
    }
}

/// Lowercases a Content-Type header value and strips its parameters
///
/// `"Text/HTML; charset=UTF-8"` becomes `"text/html"`.
pub fn normalize_content_type(value: &str) -> String {
    value
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

fn describe_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        format!("Request timeout: {}", e)
    } else if e.is_connect() {
        format!("Connection failed: {}", e)
    } else {
        e.to_string()
    }
}
