//! Error types for the scout-search crate.
//!
//! Provider-level errors are absorbed by the aggregator (a failing
//! provider contributes zero results), so most of these never reach a
//! caller of [`crate::Aggregator::search_all`]. They exist so that the
//! retry loop and the circuit breaker can tell the failure classes apart.
//! No API keys appear in error messages.

/// Errors that can occur while querying search providers.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// The provider has no credential configured or cannot be reached at all.
    #[error("provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// The provider answered 429 or 503. Retryable with backoff.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// A provider call exceeded its per-call timeout.
    #[error("search timed out: {0}")]
    Timeout(String),

    /// An HTTP request to a provider failed.
    #[error("HTTP error: {0}")]
    Http(String),

    /// Failed to parse a provider response body.
    #[error("parse error: {0}")]
    Parse(String),

    /// Invalid search configuration.
    #[error("config error: {0}")]
    Config(String),
}

impl SearchError {
    /// Returns `true` when the failing call may succeed if retried after a
    /// backoff. Only rate limiting qualifies; everything else makes the
    /// provider return empty for this call.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited(_))
    }

    /// Returns `true` when the failure should count against the provider's
    /// circuit breaker. An unconfigured provider is skipped, not broken.
    pub fn counts_as_failure(&self) -> bool {
        !matches!(self, Self::ProviderUnavailable(_) | Self::Config(_))
    }
}

/// Convenience type alias for scout-search results.
pub type Result<T> = std::result::Result<T, SearchError>;
