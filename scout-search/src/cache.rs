//! Query result cache owned by an [`crate::Aggregator`].
//!
//! Entries are keyed by the normalised query, the requested count and the
//! provider chain, and expire after the configured TTL. Uses [`moka`] for
//! async-friendly caching with bounded capacity.

use std::time::Duration;

use moka::future::Cache;

use crate::types::{ProviderId, SearchResult};

/// Maximum number of cached result sets per aggregator.
const MAX_CACHE_ENTRIES: u64 = 512;

/// Cache key for one aggregated search.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    query: String,
    count: usize,
    /// Kept in preference order: swapping the primary changes the result.
    providers: Vec<ProviderId>,
}

impl CacheKey {
    /// Build a key; the query is trimmed, lowercased and has its inner
    /// whitespace collapsed.
    pub fn new(query: &str, count: usize, providers: &[ProviderId]) -> Self {
        let query = query
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();
        Self {
            query,
            count,
            providers: providers.to_vec(),
        }
    }
}

/// TTL-bounded cache of aggregated search results.
///
/// A TTL of zero disables caching entirely.
#[derive(Clone)]
pub struct QueryCache {
    inner: Option<Cache<CacheKey, Vec<SearchResult>>>,
}

impl QueryCache {
    pub fn new(ttl_seconds: u64) -> Self {
        let inner = (ttl_seconds > 0).then(|| {
            Cache::builder()
                .max_capacity(MAX_CACHE_ENTRIES)
                .time_to_live(Duration::from_secs(ttl_seconds))
                .build()
        });
        Self { inner }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    pub async fn get(&self, key: &CacheKey) -> Option<Vec<SearchResult>> {
        match &self.inner {
            Some(cache) => cache.get(key).await,
            None => None,
        }
    }

    pub async fn insert(&self, key: CacheKey, results: Vec<SearchResult>) {
        if let Some(cache) = &self.inner {
            cache.insert(key, results).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(url: &str) -> SearchResult {
        SearchResult {
            title: "t".into(),
            url: url.into(),
            description: String::new(),
            extra_snippets: vec![],
            provider: ProviderId::Brave,
        }
    }

    #[test]
    fn key_normalises_query() {
        let a = CacheKey::new("  Seed   FINTECH ", 10, &[ProviderId::Brave]);
        let b = CacheKey::new("seed fintech", 10, &[ProviderId::Brave]);
        assert_eq!(a, b);
    }

    #[test]
    fn key_depends_on_count_and_provider_order() {
        let base = CacheKey::new("q", 10, &[ProviderId::Brave, ProviderId::Serper]);
        assert_ne!(base, CacheKey::new("q", 20, &[ProviderId::Brave, ProviderId::Serper]));
        assert_ne!(base, CacheKey::new("q", 10, &[ProviderId::Serper, ProviderId::Brave]));
    }

    #[tokio::test]
    async fn insert_then_hit() {
        let cache = QueryCache::new(60);
        let key = CacheKey::new("qonto", 5, &[ProviderId::Brave]);
        assert!(cache.get(&key).await.is_none());
        cache.insert(key.clone(), vec![result("https://qonto.com")]).await;
        let hit = cache.get(&key).await.expect("cache hit");
        assert_eq!(hit[0].url, "https://qonto.com");
    }

    #[tokio::test]
    async fn instances_do_not_share_entries() {
        let a = QueryCache::new(60);
        let b = QueryCache::new(60);
        let key = CacheKey::new("alan", 5, &[ProviderId::Brave]);
        a.insert(key.clone(), vec![result("https://alan.com")]).await;
        assert!(b.get(&key).await.is_none());
    }

    #[tokio::test]
    async fn zero_ttl_disables_cache() {
        let cache = QueryCache::new(0);
        assert!(!cache.is_enabled());
        let key = CacheKey::new("q", 1, &[ProviderId::Serper]);
        cache.insert(key.clone(), vec![result("https://x.fr")]).await;
        assert!(cache.get(&key).await.is_none());
    }
}
