//! HTTP client for the ord server's JSON API.
//!
//! [`OrdClient`] is the throttled fetcher: every request waits for a permit
//! from a shared semaphore (so at most `throttle_width` requests are in
//! flight across all callers), carries an `Accept: application/json`
//! header and a per-request timeout, and is retried through
//! [`crate::retry::send_text`]. Nothing is cached.
//!
//! # Endpoints
//!
//! | Call | Path |
//! |------|------|
//! | [`InscriptionSource::current_height`] | `/r/blockheight` |
//! | [`InscriptionSource::block_page`] | `/inscriptions/block/{height}/{page}` |
//! | [`InscriptionSource::inscription`] | `/e/inscription/{id}` |

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ord_harvest_models::{BlockPage, Height, Inscription};
use tokio::sync::Semaphore;

use crate::retry::{self, RetryPolicy};
use crate::{InscriptionSource, SourceError};

/// Default maximum number of concurrent requests.
pub const DEFAULT_THROTTLE_WIDTH: usize = 500;

/// Default deadline for a single request attempt.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Connection settings for [`OrdClient`].
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Maximum number of requests in flight at once.
    pub throttle_width: usize,
    /// Deadline for each individual attempt, including reading the body.
    pub request_timeout: Duration,
    /// Retry behaviour for transient failures.
    pub retry: RetryPolicy,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            throttle_width: DEFAULT_THROTTLE_WIDTH,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }
}

/// Throttled, retrying client for one ord server.
///
/// Cheap to clone; clones share the same connection pool and throttle.
#[derive(Debug, Clone)]
pub struct OrdClient {
    base_url: String,
    client: reqwest::Client,
    throttle: Arc<Semaphore>,
    retry: RetryPolicy,
}

impl OrdClient {
    /// Creates a client for the ord server at `base_url`
    /// (e.g. `http://localhost:8080`).
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::InvalidConfig`] if the throttle width is zero
    /// or the underlying HTTP client cannot be built.
    pub fn new(base_url: &str, options: &ClientOptions) -> Result<Self, SourceError> {
        if options.throttle_width == 0 {
            return Err(SourceError::InvalidConfig {
                message: "throttle width must be at least 1".to_string(),
            });
        }

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/json"),
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(options.request_timeout)
            .build()
            .map_err(|e| SourceError::InvalidConfig {
                message: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            throttle: Arc::new(Semaphore::new(options.throttle_width)),
            retry: options.retry,
        })
    }

    /// Returns the server base URL without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetches `path` (relative to the base URL) and returns the body.
    ///
    /// Waits for a throttle permit first; the permit is held across all
    /// retries of this request.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the request fails after all retries or
    /// the server returns a non-retryable status.
    pub async fn fetch(&self, path: &str) -> Result<String, SourceError> {
        let url = format!("{}{path}", self.base_url);

        let _permit = self
            .throttle
            .acquire()
            .await
            .map_err(|e| SourceError::InvalidConfig {
                message: format!("request throttle closed: {e}"),
            })?;

        log::trace!("GET {url}");
        retry::send_text(|| self.client.get(&url), &self.retry).await
    }
}

#[async_trait]
impl InscriptionSource for OrdClient {
    async fn current_height(&self) -> Result<Height, SourceError> {
        let body = self.fetch("/r/blockheight").await?;
        parse_height(&body)
    }

    async fn block_page(&self, height: Height, page: u32) -> Result<BlockPage, SourceError> {
        let body = self
            .fetch(&format!("/inscriptions/block/{height}/{page}"))
            .await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn inscription(&self, inscription_id: &str) -> Result<Inscription, SourceError> {
        let body = self
            .fetch(&format!("/e/inscription/{inscription_id}"))
            .await?;
        Ok(serde_json::from_str(&body)?)
    }
}

/// Parses the plain-text block height body.
fn parse_height(body: &str) -> Result<Height, SourceError> {
    let trimmed = body.trim();
    trimmed.parse().map_err(|e| SourceError::Parse {
        message: format!("block height {trimmed:?} is not an integer: {e}"),
    })
}
