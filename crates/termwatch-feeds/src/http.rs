//! HTTP clients for the upstream alert and term feeds
//!
//! Each feed is a single `GET <url>?key=<api key>` endpoint returning a JSON
//! array. Requests time out after [`DEFAULT_TIMEOUT_SECS`]; failed attempts
//! are retried with exponential backoff up to the configured attempt count.
//!
//! # Examples
//!
//! ```no_run
//! use termwatch_feeds::{FeedEndpoint, HttpAlertSource};
//! use termwatch_domain::AlertTextSource;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let source = HttpAlertSource::new(FeedEndpoint::new(
//!     "https://feeds.example.com/api/alerts",
//!     "secret",
//! ))?;
//! let alerts = source.fetch_alerts().await?;
//! println!("fetched {} alerts", alerts.len());
//! # Ok(())
//! # }
//! ```

use crate::wire;
use crate::FeedError;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use termwatch_domain::{AlertText, AlertTextSource, QueryTerm, QueryTermSource, SourceError};

/// Default timeout for feed requests (10 seconds)
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Default number of attempts per fetch (no retry)
pub const DEFAULT_MAX_ATTEMPTS: u32 = 1;

/// First retry delay in milliseconds; doubles with every further attempt
const BASE_BACKOFF_MS: u64 = 100;

/// Upper bound on a single retry delay in milliseconds
const MAX_BACKOFF_MS: u64 = 5_000;

/// Location and credentials of one upstream feed
#[derive(Debug, Clone)]
pub struct FeedEndpoint {
    /// Feed URL, without the key parameter
    pub url: String,
    /// API key sent as the `key` query parameter
    pub api_key: String,
    /// Request timeout
    pub timeout: Duration,
    /// Attempts per fetch before giving up
    pub max_attempts: u32,
}

impl FeedEndpoint {
    /// Create an endpoint with default timeout and no retries
    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: api_key.into(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the number of attempts per fetch (at least one is always made)
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    fn validate(&self) -> Result<(), FeedError> {
        if self.url.trim().is_empty() {
            return Err(FeedError::MissingSetting("url"));
        }
        if self.api_key.trim().is_empty() {
            return Err(FeedError::MissingSetting("api_key"));
        }
        Ok(())
    }
}

/// Shared plumbing of both feed clients
struct FeedClient {
    endpoint: FeedEndpoint,
    client: reqwest::Client,
}

impl FeedClient {
    fn new(endpoint: FeedEndpoint) -> Result<Self, FeedError> {
        endpoint.validate()?;
        let client = reqwest::Client::builder()
            .timeout(endpoint.timeout)
            .build()
            .map_err(|e| FeedError::Client(e.to_string()))?;

        Ok(Self { endpoint, client })
    }

    async fn get_json(&self) -> Result<Value, SourceError> {
        let mut attempts = 0;

        loop {
            attempts += 1;
            match self.get_once().await {
                Ok(body) => return Ok(body),
                Err(e) if attempts < self.endpoint.max_attempts && is_retryable(&e) => {
                    let delay = backoff_delay(attempts);
                    tracing::debug!(
                        "Feed request to {} failed (attempt {}): {}; retrying in {:?}",
                        self.endpoint.url,
                        attempts,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn get_once(&self) -> Result<Value, SourceError> {
        let response = self
            .client
            .get(&self.endpoint.url)
            .query(&[("key", self.endpoint.api_key.as_str())])
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(SourceError::Status {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| SourceError::Decode(format!("Failed to parse response: {}", e)))
    }
}

fn transport_error(e: reqwest::Error) -> SourceError {
    if e.is_timeout() {
        SourceError::Transport("Request timeout".to_string())
    } else {
        SourceError::Transport(format!("Request failed: {}", e))
    }
}

/// Exponential backoff: 100ms, 200ms, 400ms, ... capped at 5s
fn backoff_delay(attempt: u32) -> Duration {
    let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
    Duration::from_millis(BASE_BACKOFF_MS.saturating_mul(factor).min(MAX_BACKOFF_MS))
}

fn is_retryable(e: &SourceError) -> bool {
    match e {
        SourceError::Transport(_) => true,
        SourceError::Status { status, .. } => *status >= 500,
        _ => false,
    }
}

/// Alert feed client
pub struct HttpAlertSource {
    inner: FeedClient,
}

impl HttpAlertSource {
    /// Create a client for the given endpoint
    ///
    /// # Errors
    ///
    /// Fails if the URL or key is empty or the HTTP client cannot be built.
    pub fn new(endpoint: FeedEndpoint) -> Result<Self, FeedError> {
        Ok(Self {
            inner: FeedClient::new(endpoint)?,
        })
    }
}

#[async_trait]
impl AlertTextSource for HttpAlertSource {
    async fn fetch_alerts(&self) -> Result<Vec<AlertText>, SourceError> {
        let alerts = wire::decode_alerts(self.inner.get_json().await?)?;
        tracing::debug!("Fetched {} alerts from {}", alerts.len(), self.inner.endpoint.url);
        Ok(alerts)
    }
}

/// Query term feed client
pub struct HttpTermSource {
    inner: FeedClient,
}

impl HttpTermSource {
    /// Create a client for the given endpoint
    ///
    /// # Errors
    ///
    /// Fails if the URL or key is empty or the HTTP client cannot be built.
    pub fn new(endpoint: FeedEndpoint) -> Result<Self, FeedError> {
        Ok(Self {
            inner: FeedClient::new(endpoint)?,
        })
    }
}

#[async_trait]
impl QueryTermSource for HttpTermSource {
    async fn fetch_terms(&self) -> Result<Vec<QueryTerm>, SourceError> {
        let terms = wire::decode_terms(self.inner.get_json().await?)?;
        tracing::debug!("Fetched {} terms from {}", terms.len(), self.inner.endpoint.url);
        Ok(terms)
    }
}
