//! HTTP retry with exponential backoff.
//!
//! Every request to the ord server goes through [`send_text`], which
//! retries transient failures (connection errors, timeouts, interrupted
//! bodies, HTTP 429, HTTP 5xx) up to [`RetryPolicy::max_retries`] times.
//! Client errors are returned immediately. Parsing happens in the caller
//! and is never retried: a malformed body stays malformed.
//!
//! # Usage
//!
//! ```ignore
//! let body = retry::send_text(|| client.get(&url), &RetryPolicy::default()).await?;
//! ```

use std::time::Duration;

use crate::SourceError;

/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 10;

/// Default delay before the first retry. Doubles on each further retry.
pub const DEFAULT_MIN_BACKOFF: Duration = Duration::from_secs(1);

/// Default ceiling on the delay between two attempts.
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(30);

/// How many times, and how patiently, a failed request is repeated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the initial attempt. `0` disables retrying.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub min_backoff: Duration,
    /// Upper bound for any single delay.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            min_backoff: DEFAULT_MIN_BACKOFF,
            max_backoff: DEFAULT_MAX_BACKOFF,
        }
    }
}

impl RetryPolicy {
    /// Sets the number of retries.
    #[must_use]
    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the backoff bounds.
    #[must_use]
    pub const fn with_backoff(mut self, min: Duration, max: Duration) -> Self {
        self.min_backoff = min;
        self.max_backoff = max;
        self
    }

    /// Delay to wait before retry number `retry` (1-based): `min_backoff`,
    /// then doubling, capped at `max_backoff`.
    #[must_use]
    pub fn backoff(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(16);
        self.min_backoff
            .saturating_mul(1u32 << exponent)
            .min(self.max_backoff)
    }
}

/// Sends an HTTP request and returns the response body as text.
///
/// The `build_request` closure is called on each attempt to construct a
/// fresh [`reqwest::RequestBuilder`] (builders are consumed by `.send()`).
///
/// # Errors
///
/// * [`SourceError::Status`] for a non-retryable status code.
/// * [`SourceError::Http`] for a non-transient transport error.
/// * [`SourceError::RetriesExhausted`] once every attempt has failed with a
///   transient error.
#[allow(clippy::future_not_send)]
pub async fn send_text<F>(build_request: F, policy: &RetryPolicy) -> Result<String, SourceError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut last_error: Option<SourceError> = None;
    let mut url = String::new();

    for attempt in 0..=policy.max_retries {
        if attempt > 0 {
            let delay = policy.backoff(attempt);
            log::debug!(
                "  retry {attempt}/{} for {url} in {delay:?}...",
                policy.max_retries
            );
            tokio::time::sleep(delay).await;
        }

        match send_once(&build_request).await {
            Ok(body) => return Ok(body),
            Err((request_url, e)) => {
                if let Some(request_url) = request_url {
                    url = request_url;
                }
                if !e.is_retryable() {
                    return Err(e);
                }
                log::debug!("  transient error: {e}");
                last_error = Some(e);
            }
        }
    }

    let last_error = last_error.map_or_else(|| "no attempts made".to_string(), |e| e.to_string());
    log::warn!(
        "Giving up on {url} after {} attempts: {last_error}",
        policy.max_retries + 1
    );

    Err(SourceError::RetriesExhausted {
        url,
        attempts: policy.max_retries + 1,
        last_error,
    })
}

/// Performs one attempt. On failure, also returns the URL when it is known
/// so the caller can report it.
#[allow(clippy::future_not_send)]
async fn send_once<F>(build_request: &F) -> Result<String, (Option<String>, SourceError)>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let response = build_request().send().await.map_err(|e| {
        let url = e.url().map(ToString::to_string);
        (url, SourceError::Http(e))
    })?;

    let url = response.url().to_string();
    let status = response.status();

    if !status.is_success() {
        return Err((
            Some(url.clone()),
            SourceError::Status {
                url,
                status: status.as_u16(),
            },
        ));
    }

    response
        .text()
        .await
        .map_err(|e| (Some(url), SourceError::Http(e)))
}
