#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Read-only access to an ord server's inscription API.
//!
//! The harvester only needs three calls, captured by the
//! [`InscriptionSource`] trait: the current block height, one page of a
//! block's inscription listing, and the detail document for one
//! inscription. [`client::OrdClient`] implements it over HTTP with bounded
//! concurrency and automatic retry (see [`retry`]).

pub mod client;
pub mod progress;
pub mod retry;

use async_trait::async_trait;
use ord_harvest_models::{BlockPage, Height, Inscription};

/// Errors that can occur while talking to the ord server.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// HTTP request failed before a response arrived (connect, timeout,
    /// body read).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status code.
    #[error("HTTP {status} from {url}")]
    Status {
        /// Requested URL.
        url: String,
        /// Status code returned.
        status: u16,
    },

    /// The response body was not the JSON we expected.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// The response body was not in the expected plain-text format.
    #[error("Parse error: {message}")]
    Parse {
        /// Description of what went wrong.
        message: String,
    },

    /// Every attempt allowed by the retry policy failed with a transient
    /// error.
    #[error("{url}: giving up after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        /// Requested URL.
        url: String,
        /// Number of attempts made.
        attempts: u32,
        /// The error from the final attempt.
        last_error: String,
    },

    /// The client could not be constructed from the given settings.
    #[error("Invalid client configuration: {message}")]
    InvalidConfig {
        /// Description of what went wrong.
        message: String,
    },
}

impl SourceError {
    /// Returns `true` if repeating the request could plausibly succeed.
    ///
    /// Connection failures, timeouts, interrupted bodies, HTTP 429 and
    /// HTTP 5xx are transient. Client errors and unparseable payloads are
    /// not: the same request would produce the same answer.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => {
                e.is_timeout() || e.is_connect() || e.is_body() || e.is_decode() || e.is_request()
            }
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::Json(_)
            | Self::Parse { .. }
            | Self::RetriesExhausted { .. }
            | Self::InvalidConfig { .. } => false,
        }
    }
}

/// The read-only view of an inscription source the harvester depends on.
///
/// Implementations must be safe to call from many tasks at once; they hold
/// no per-block state.
#[async_trait]
pub trait InscriptionSource: Send + Sync {
    /// Returns the most recent block height the source knows about (the
    /// harvesting frontier).
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the request fails or the body is not an
    /// integer.
    async fn current_height(&self) -> Result<Height, SourceError>;

    /// Fetches one page of the inscription listing for `height`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the request fails or the body is not a
    /// valid listing page.
    async fn block_page(&self, height: Height, page: u32) -> Result<BlockPage, SourceError>;

    /// Fetches the detail document for a single inscription.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the request fails or the body is not a
    /// valid inscription.
    async fn inscription(&self, inscription_id: &str) -> Result<Inscription, SourceError>;
}
