//! Client configuration.

use std::time::Duration;

use anyhow::Context;

/// Environment variable holding the data endpoint base URL.
pub const ENV_API_URL: &str = "FOLIO_API_URL";
/// Environment variable overriding the per-request timeout, in milliseconds.
pub const ENV_REQUEST_TIMEOUT_MS: &str = "FOLIO_REQUEST_TIMEOUT_MS";
/// Environment variable overriding the read retry count.
pub const ENV_MAX_RETRIES: &str = "FOLIO_MAX_RETRIES";

/// Configuration for [`Db`](crate::Db) and the optimistic controller.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the data endpoint; `/db/{table}` is appended to it.
    pub base_url: String,
    /// Deadline for one request, read retries included. Multi-row writes
    /// apply it to each row's request.
    pub request_timeout: Duration,
    /// Extra attempts for reads that fail at the transport level.
    /// Writes are never retried.
    pub max_retries: u32,
    /// Pause between read attempts.
    pub retry_backoff: Duration,
    /// Deadline for an optimistic commit before it is rolled back.
    pub commit_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            request_timeout: Duration::from_secs(15),
            max_retries: 2,
            retry_backoff: Duration::from_millis(200),
            commit_timeout: Duration::from_secs(15),
        }
    }
}

impl ClientConfig {
    /// Config pointing at `base_url` with default timeouts.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Reads overrides from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric variable is set but does not parse.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let mut config = Self::default();
        if let Some(url) = lookup(ENV_API_URL) {
            config.base_url = url;
        }
        if let Some(ms) = lookup(ENV_REQUEST_TIMEOUT_MS) {
            let ms: u64 = ms
                .parse()
                .with_context(|| format!("{ENV_REQUEST_TIMEOUT_MS} must be an integer"))?;
            config.request_timeout = Duration::from_millis(ms);
        }
        if let Some(retries) = lookup(ENV_MAX_RETRIES) {
            config.max_retries = retries
                .parse()
                .with_context(|| format!("{ENV_MAX_RETRIES} must be an integer"))?;
        }
        Ok(config)
    }
}
