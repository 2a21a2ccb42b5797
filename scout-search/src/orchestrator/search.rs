//! Cost-aware multi-provider search with fallback.
//!
//! The [`Aggregator`] calls the primary provider first and only fans out
//! to the secondaries when the primary under-delivers. Provider failures
//! never escape: a provider that errors, times out, is unconfigured or
//! has an open circuit simply contributes zero results.

use std::sync::Arc;
use std::time::Duration;

use crate::cache::{CacheKey, QueryCache};
use crate::circuit_breaker::{CircuitBreaker, CircuitState};
use crate::config::SearchConfig;
use crate::error::SearchError;
use crate::http::{build_client, retry_rate_limited};
use crate::provider::SearchProvider;
use crate::providers::{BraveProvider, SerperProvider};
use crate::types::{ProviderId, SearchResult};

use super::dedup::dedup_first_occurrence;

/// Multi-provider search aggregator.
///
/// Owns its circuit breaker and query cache, so two aggregators never
/// share provider health or cached results.
pub struct Aggregator {
    /// Preference order; index 0 is the primary.
    providers: Vec<Arc<dyn SearchProvider>>,
    config: SearchConfig,
    breaker: CircuitBreaker,
    cache: QueryCache,
}

impl Aggregator {
    /// Build an aggregator over an explicit, ordered provider list.
    ///
    /// `config.providers` is not consulted here; the order of `providers`
    /// is the fallback order.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Config`] if `providers` is empty or the
    /// config fails validation.
    pub fn new(
        providers: Vec<Arc<dyn SearchProvider>>,
        config: SearchConfig,
    ) -> Result<Self, SearchError> {
        config.validate()?;
        if providers.is_empty() {
            return Err(SearchError::Config(
                "aggregator needs at least one provider".into(),
            ));
        }
        Ok(Self {
            providers,
            breaker: CircuitBreaker::new(config.circuit_breaker.clone()),
            cache: QueryCache::new(config.cache_ttl_seconds),
            config,
        })
    }

    /// Build the HTTP providers listed in `config.providers`, reading API
    /// keys from the environment variables the config names.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Config`] for an invalid config and
    /// [`SearchError::Http`] if the HTTP client cannot be built.
    pub fn from_config(config: SearchConfig) -> Result<Self, SearchError> {
        config.validate()?;
        let client = build_client(&config)?;
        let providers = config
            .providers
            .iter()
            .map(|id| -> Arc<dyn SearchProvider> {
                match id {
                    ProviderId::Brave => Arc::new(BraveProvider::from_env(
                        client.clone(),
                        &config.brave_api_key_env,
                    )),
                    ProviderId::Serper => Arc::new(SerperProvider::from_env(
                        client.clone(),
                        &config.serper_api_key_env,
                    )),
                }
            })
            .collect::<Vec<_>>();
        for provider in &providers {
            if !provider.is_configured() {
                tracing::info!(
                    provider = %provider.id(),
                    "search provider has no API key; it will be skipped"
                );
            }
        }
        Self::new(providers, config)
    }

    /// Provider ids in fallback order.
    pub fn provider_ids(&self) -> Vec<ProviderId> {
        self.providers.iter().map(|p| p.id()).collect()
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Health of this aggregator's providers.
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Search for up to `count` results.
    ///
    /// 1. Serve from cache when possible.
    /// 2. Call the primary; if it returns at least
    ///    [`SearchConfig::sufficiency_threshold`] results, stop there.
    /// 3. Otherwise call every secondary concurrently for the shortfall.
    /// 4. Merge primary-first, dedup by normalised URL keeping the first
    ///    occurrence, truncate to `count`.
    ///
    /// Never fails: provider errors are logged and yield zero results.
    pub async fn search_all(&self, query: &str, count: usize) -> Vec<SearchResult> {
        if count == 0 || query.trim().is_empty() {
            return Vec::new();
        }

        let key = CacheKey::new(query, count, &self.provider_ids());
        if let Some(hit) = self.cache.get(&key).await {
            tracing::trace!(query, hits = hit.len(), "search cache hit");
            return hit;
        }

        let Some((primary, secondaries)) = self.providers.split_first() else {
            return Vec::new();
        };

        // Dedup before the sufficiency check so repeated URLs from the
        // primary do not mask a shortfall.
        let mut merged =
            dedup_first_occurrence(self.call_provider(primary.as_ref(), query, count).await);
        let threshold = self.config.sufficiency_threshold(count);

        if merged.len() < threshold && !secondaries.is_empty() {
            let shortfall = count.saturating_sub(merged.len()).max(1);
            tracing::debug!(
                primary = %primary.id(),
                returned = merged.len(),
                threshold,
                shortfall,
                "primary under-delivered; querying secondaries"
            );
            let calls = secondaries
                .iter()
                .map(|p| self.call_provider(p.as_ref(), query, shortfall));
            for results in futures::future::join_all(calls).await {
                merged.extend(results);
            }
        }

        let mut results = dedup_first_occurrence(merged);
        results.truncate(count);

        if !results.is_empty() {
            self.cache.insert(key, results.clone()).await;
        }
        results
    }

    /// One provider call with breaker, timeout and rate-limit retries.
    async fn call_provider(
        &self,
        provider: &dyn SearchProvider,
        query: &str,
        count: usize,
    ) -> Vec<SearchResult> {
        let id = provider.id();
        if !provider.is_configured() {
            tracing::debug!(provider = %id, "skipping unconfigured provider");
            return Vec::new();
        }
        if !self.breaker.should_attempt(id) {
            tracing::debug!(provider = %id, "skipping provider with open circuit");
            return Vec::new();
        }

        let timeout = Duration::from_secs(self.config.timeout_seconds);
        let outcome = tokio::time::timeout(
            timeout,
            retry_rate_limited(id, &self.config, || provider.search(query, count)),
        )
        .await
        .unwrap_or_else(|_| {
            Err(SearchError::Timeout(format!(
                "{id} exceeded {}s",
                self.config.timeout_seconds
            )))
        });

        match outcome {
            Ok(mut results) => {
                self.breaker.record_success(id);
                results.truncate(count);
                tracing::debug!(provider = %id, count = results.len(), "provider returned results");
                results
            }
            Err(err) => {
                // A half-open probe must report back either way.
                if err.counts_as_failure() || self.breaker.state(id) == CircuitState::HalfOpen {
                    self.breaker.record_failure(id);
                }
                tracing::warn!(
                    provider = %id,
                    error = %err,
                    "search provider failed; continuing without it"
                );
                Vec::new()
            }
        }
    }
}
