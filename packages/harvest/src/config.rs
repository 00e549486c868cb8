//! Command-line and environment configuration.

use std::time::Duration;

use clap::Args;
use ord_harvest_models::Height;
use ord_harvest_source::{
    client::{ClientOptions, DEFAULT_REQUEST_TIMEOUT, DEFAULT_THROTTLE_WIDTH},
    retry::{DEFAULT_MAX_RETRIES, RetryPolicy},
};

use crate::{DEFAULT_GENESIS_HEIGHT, FailurePolicy, HarvestError, HarvestOptions};

/// Settings for talking to the ord server and walking its blocks.
#[derive(Debug, Clone, Args)]
pub struct HarvestConfig {
    /// Base URL of the ord server (e.g. `http://localhost:8080`)
    #[arg(long, env = "ORD_HOST")]
    pub ord_host: String,

    /// Maximum number of inscription fetches in flight
    #[arg(long, env = "ORD_HARVEST_THROTTLE_WIDTH", default_value_t = DEFAULT_THROTTLE_WIDTH)]
    pub throttle_width: usize,

    /// Block to start from when the store is empty
    #[arg(long, env = "ORD_HARVEST_GENESIS_HEIGHT", default_value_t = DEFAULT_GENESIS_HEIGHT)]
    pub genesis_height: Height,

    /// Retries per request after the first attempt
    #[arg(long, default_value_t = DEFAULT_MAX_RETRIES)]
    pub max_retries: u32,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = DEFAULT_REQUEST_TIMEOUT.as_secs())]
    pub request_timeout_secs: u64,

    /// What to do when a page or inscription cannot be fetched (`strict`
    /// or `lenient`)
    #[arg(long, default_value_t = FailurePolicy::Strict)]
    pub failure_policy: FailurePolicy,

    /// Stop after this block even if the server has newer ones
    #[arg(long)]
    pub stop_height: Option<Height>,
}

impl HarvestConfig {
    /// Checks the settings before anything touches the network or store.
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError::Config`] if the host is empty or not an
    /// `http(s)` URL, or if the throttle width or timeout is zero.
    pub fn validate(&self) -> Result<(), HarvestError> {
        let host = self.ord_host.trim();
        if host.is_empty() {
            return Err(config_error("ord host must not be empty"));
        }
        if !(host.starts_with("http://") || host.starts_with("https://")) {
            return Err(config_error(format!("ord host must be an http(s) URL, got {host:?}")));
        }
        if self.throttle_width == 0 {
            return Err(config_error("throttle width must be at least 1"));
        }
        if self.request_timeout_secs == 0 {
            return Err(config_error("request timeout must be at least 1 second"));
        }
        Ok(())
    }

    #[must_use]
    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            throttle_width: self.throttle_width,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            retry: RetryPolicy::default().with_max_retries(self.max_retries),
        }
    }

    #[must_use]
    pub const fn harvest_options(&self) -> HarvestOptions {
        HarvestOptions {
            genesis_height: self.genesis_height,
            stop_height: self.stop_height,
            throttle_width: self.throttle_width,
            failure_policy: self.failure_policy,
        }
    }
}

fn config_error(message: impl Into<String>) -> HarvestError {
    HarvestError::Config {
        message: message.into(),
    }
}
