//! HTTP fetcher implementation
//!
//! This module handles the single network attempt behind every task:
//! - Building the HTTP client with explicit timeouts
//! - Routing requests through the optional proxy API
//! - Classifying non-success statuses and transport failures
//!
//! Retries are handled by [`crate::crawler::with_retry`].

use crate::config::{Config, ProxyConfig};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use thiserror::Error;
use url::Url;

const USER_AGENT: &str = concat!("listing-harvest/", env!("CARGO_PKG_VERSION"));

/// Opaque routing parameters handed to the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingHints {
    /// Target country/locale the request should appear to come from
    pub country: String,
}

impl RoutingHints {
    pub fn new(country: impl Into<String>) -> Self {
        Self {
            country: country.into(),
        }
    }
}

/// A page retrieved with an "ok" status
#[derive(Debug, Clone)]
pub struct Payload {
    /// The target URL (not the proxy URL)
    pub url: String,
    /// HTTP status code
    pub status_code: u16,
    /// Decoded page body
    pub body: String,
}

/// Unified failure for one fetch attempt
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Failed request to {url}, status code {status_code}")]
    Status { url: String, status_code: u16 },

    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("Transport error for {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to decode body from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("Invalid request URL {url}: {message}")]
    InvalidUrl { url: String, message: String },
}

impl FetchError {
    /// The target URL the attempt was made for
    pub fn url(&self) -> &str {
        match self {
            Self::Status { url, .. }
            | Self::Timeout { url }
            | Self::Transport { url, .. }
            | Self::Decode { url, .. }
            | Self::InvalidUrl { url, .. } => url,
        }
    }

    /// The HTTP status, when the server answered at all
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status_code, .. } => Some(*status_code),
            _ => None,
        }
    }
}

/// One retrieve-and-decode attempt for a URL
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str, routing: &RoutingHints) -> Result<Payload, FetchError>;
}

/// Builds the HTTP client used by [`HttpFetcher`]
///
/// `timeout` bounds the whole request; connecting is capped separately.
pub fn build_http_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Rewrites a target URL into a proxy API request
///
/// ```
/// use listing_harvest::config::ProxyConfig;
/// use listing_harvest::crawler::{proxied_url, RoutingHints};
///
/// let proxy = ProxyConfig {
///     endpoint: "https://proxy.example.com/v1/".to_string(),
///     api_key: "key".to_string(),
///     wait_ms: 3000,
/// };
/// let url = proxied_url(&proxy, "https://www.redfin.com/a b", &RoutingHints::new("us")).unwrap();
/// assert_eq!(
///     url.as_str(),
///     "https://proxy.example.com/v1/?api_key=key&url=https%3A%2F%2Fwww.redfin.com%2Fa+b&country=us&wait=3000"
/// );
/// ```
pub fn proxied_url(
    proxy: &ProxyConfig,
    target: &str,
    routing: &RoutingHints,
) -> Result<Url, url::ParseError> {
    let mut url = Url::parse(&proxy.endpoint)?;
    url.query_pairs_mut()
        .append_pair("api_key", &proxy.api_key)
        .append_pair("url", target)
        .append_pair("country", &routing.country)
        .append_pair("wait", &proxy.wait_ms.to_string());
    Ok(url)
}

/// [`Fetcher`] backed by reqwest
pub struct HttpFetcher {
    client: Client,
    proxy: Option<ProxyConfig>,
}

impl HttpFetcher {
    pub fn new(client: Client, proxy: Option<ProxyConfig>) -> Self {
        Self { client, proxy }
    }

    /// Builds a fetcher with the configured timeout and proxy
    pub fn from_config(config: &Config) -> Result<Self, reqwest::Error> {
        let timeout = Duration::from_secs(config.crawler.fetch_timeout_secs);
        let client = build_http_client(timeout)?;
        Ok(Self::new(client, config.proxy.clone()))
    }

    fn request_url(&self, url: &str, routing: &RoutingHints) -> Result<Url, FetchError> {
        let invalid = |e: url::ParseError| FetchError::InvalidUrl {
            url: url.to_string(),
            message: e.to_string(),
        };

        // Validate the target even when proxying so bad rows fail early
        let target = Url::parse(url).map_err(invalid)?;

        match &self.proxy {
            Some(proxy) => proxied_url(proxy, target.as_str(), routing).map_err(invalid),
            None => Ok(target),
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str, routing: &RoutingHints) -> Result<Payload, FetchError> {
        let request_url = self.request_url(url, routing)?;

        let response = self
            .client
            .get(request_url)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout {
                        url: url.to_string(),
                    }
                } else {
                    FetchError::Transport {
                        url: url.to_string(),
                        source: e,
                    }
                }
            })?;

        let status = response.status();
        tracing::info!("Received [{}] from: {}", status.as_u16(), url);

        if status != StatusCode::OK {
            return Err(FetchError::Status {
                url: url.to_string(),
                status_code: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout {
                    url: url.to_string(),
                }
            } else {
                FetchError::Decode {
                    url: url.to_string(),
                    message: e.to_string(),
                }
            }
        })?;

        Ok(Payload {
            url: url.to_string(),
            status_code: status.as_u16(),
            body,
        })
    }
}
