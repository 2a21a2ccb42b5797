//! Search configuration with sensible defaults.
//!
//! [`SearchConfig`] controls provider order, the primary-sufficiency
//! threshold, per-call timeouts, rate-limit retries, caching and the
//! per-provider circuit breaker. It is embedded as the `[search]` table of
//! the application config, so every field has a serde default.

use serde::{Deserialize, Serialize};

use crate::circuit_breaker::CircuitBreakerConfig;
use crate::error::SearchError;
use crate::types::ProviderId;

/// Configuration for a search aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Providers in preference order. The first entry is the primary; the
    /// rest are only called when the primary under-delivers.
    pub providers: Vec<ProviderId>,
    /// Fraction of the requested count the primary must return for the
    /// secondaries to be skipped.
    pub primary_sufficiency_ratio: f64,
    /// Hard timeout in seconds for one provider call, retries included.
    pub timeout_seconds: u64,
    /// Maximum attempts per provider call when rate limited (429/503).
    pub max_attempts: u32,
    /// Base delay for exponential backoff between rate-limited attempts.
    pub base_backoff_ms: u64,
    /// Upper bound for a single backoff delay.
    pub max_backoff_ms: u64,
    /// How long to cache aggregated results in seconds. 0 disables caching.
    pub cache_ttl_seconds: u64,
    /// Environment variable holding the Brave Search API key.
    pub brave_api_key_env: String,
    /// Environment variable holding the Serper API key.
    pub serper_api_key_env: String,
    /// Custom User-Agent header. `None` uses the crate default.
    pub user_agent: Option<String>,
    /// Per-provider circuit breaker tuning.
    pub circuit_breaker: CircuitBreakerConfig,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            providers: vec![ProviderId::Brave, ProviderId::Serper],
            primary_sufficiency_ratio: 0.7,
            timeout_seconds: 10,
            max_attempts: 3,
            base_backoff_ms: 500,
            max_backoff_ms: 4_000,
            cache_ttl_seconds: 900,
            brave_api_key_env: "BRAVE_API_KEY".to_owned(),
            serper_api_key_env: "SERPER_API_KEY".to_owned(),
            user_agent: None,
            circuit_breaker: CircuitBreakerConfig::default(),
        }
    }
}

impl SearchConfig {
    /// Validates this configuration, returning an error if any field is invalid.
    ///
    /// Checks:
    /// - `providers` must not be empty and must not repeat a provider
    /// - `primary_sufficiency_ratio` must lie in `(0, 1]`
    /// - `timeout_seconds` and `max_attempts` must be greater than 0
    /// - `base_backoff_ms` must be <= `max_backoff_ms`
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.providers.is_empty() {
            return Err(SearchError::Config(
                "at least one provider must be enabled".into(),
            ));
        }
        for (i, provider) in self.providers.iter().enumerate() {
            if self.providers[..i].contains(provider) {
                return Err(SearchError::Config(format!(
                    "provider {provider} listed more than once"
                )));
            }
        }
        if !(self.primary_sufficiency_ratio > 0.0 && self.primary_sufficiency_ratio <= 1.0) {
            return Err(SearchError::Config(
                "primary_sufficiency_ratio must be in (0, 1]".into(),
            ));
        }
        if self.timeout_seconds == 0 {
            return Err(SearchError::Config(
                "timeout_seconds must be greater than 0".into(),
            ));
        }
        if self.max_attempts == 0 {
            return Err(SearchError::Config(
                "max_attempts must be greater than 0".into(),
            ));
        }
        if self.base_backoff_ms > self.max_backoff_ms {
            return Err(SearchError::Config(
                "base_backoff_ms must be <= max_backoff_ms".into(),
            ));
        }
        Ok(())
    }

    /// Number of results the primary must return to short-circuit the
    /// fallback chain for a request of `count` results.
    pub fn sufficiency_threshold(&self, count: usize) -> usize {
        (count as f64 * self.primary_sufficiency_ratio).ceil() as usize
    }
}
