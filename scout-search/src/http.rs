//! Shared HTTP plumbing for provider calls.
//!
//! Builds the [`reqwest::Client`] used by the providers, maps HTTP status
//! codes onto [`SearchError`], and implements the rate-limit retry loop
//! with exponential backoff and jitter.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::config::SearchConfig;
use crate::error::SearchError;
use crate::types::ProviderId;

/// User-Agent sent when the config does not override it.
const DEFAULT_USER_AGENT: &str = concat!("thesis-scout/", env!("CARGO_PKG_VERSION"));

/// Maximum random jitter added to each backoff delay.
const MAX_JITTER_MS: u64 = 250;

/// Build a [`reqwest::Client`] configured for provider API calls.
///
/// # Errors
///
/// Returns [`SearchError::Http`] if the client cannot be constructed.
pub fn build_client(config: &SearchConfig) -> Result<reqwest::Client, SearchError> {
    let ua = config
        .user_agent
        .clone()
        .unwrap_or_else(|| DEFAULT_USER_AGENT.to_owned());

    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_seconds))
        .user_agent(ua)
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()
        .map_err(|e| SearchError::Http(format!("failed to build HTTP client: {e}")))
}

/// Map a non-success HTTP status onto the provider error taxonomy.
pub fn classify_status(provider: ProviderId, status: reqwest::StatusCode) -> SearchError {
    match status.as_u16() {
        429 | 503 => SearchError::RateLimited(format!("{provider} returned {status}")),
        401 | 403 => SearchError::ProviderUnavailable(format!(
            "{provider} rejected credentials ({status})"
        )),
        _ => SearchError::Http(format!("{provider} returned {status}")),
    }
}

/// Exponential backoff for the given zero-based retry attempt, capped.
///
/// `attempt = 0` yields `base_ms`, each further attempt doubles it.
pub fn backoff_delay(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
    Duration::from_millis(base_ms.saturating_mul(factor).min(max_ms))
}

/// Run `op` until it succeeds, fails with a non-retryable error, or
/// `config.max_attempts` attempts have been spent.
///
/// Only [`SearchError::RateLimited`] is retried. Each retry waits
/// [`backoff_delay`] plus a small random jitter.
pub async fn retry_rate_limited<T, F, Fut>(
    provider: ProviderId,
    config: &SearchConfig,
    mut op: F,
) -> Result<T, SearchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SearchError>>,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt + 1 < config.max_attempts => {
                let delay = backoff_delay(attempt, config.base_backoff_ms, config.max_backoff_ms)
                    + jitter();
                tracing::debug!(
                    %provider,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "provider rate limited; backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

fn jitter() -> Duration {
    Duration::from_millis(rand::thread_rng().gen_range(0..=MAX_JITTER_MS))
}
