//! Trait definition for pluggable search providers.
//!
//! Each provider (Brave, Serper) implements [`SearchProvider`] so the
//! aggregator can treat them uniformly. A provider performs exactly one
//! request per call; retries, timeouts and the circuit breaker live in
//! the aggregator.

use async_trait::async_trait;

use crate::error::SearchError;
use crate::types::{ProviderId, SearchResult};

/// A pluggable search provider backend.
///
/// Implementations handle their own request construction and response
/// parsing, and map HTTP status codes onto [`SearchError`]:
///
/// - 429 / 503 → [`SearchError::RateLimited`]
/// - missing credential, 401 / 403 → [`SearchError::ProviderUnavailable`]
/// - anything else → [`SearchError::Http`] or [`SearchError::Parse`]
///
/// All implementations must be `Send + Sync` for concurrent fan-out.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Which provider this implementation represents.
    fn id(&self) -> ProviderId;

    /// Returns `false` when the provider lacks a credential and should be
    /// skipped without a network call.
    fn is_configured(&self) -> bool {
        true
    }

    /// Run one search, returning at most `count` results.
    ///
    /// Under-returning is valid; so is returning zero results.
    async fn search(&self, query: &str, count: usize) -> Result<Vec<SearchResult>, SearchError>;
}
