//! Brave Web Search API provider.
//!
//! Brave runs its own index and has the most generous free quota of the
//! supported providers, which makes it the default primary.

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::SearchError;
use crate::http::classify_status;
use crate::provider::SearchProvider;
use crate::types::{ProviderId, SearchResult};

/// Production endpoint of the Brave Web Search API.
const DEFAULT_BASE_URL: &str = "https://api.search.brave.com";

/// Brave caps `count` at 20 per request.
const MAX_COUNT: usize = 20;

/// Brave Web Search API client.
pub struct BraveProvider {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
}

impl BraveProvider {
    /// Create a provider. `api_key = None` leaves it unconfigured.
    pub fn new(client: reqwest::Client, api_key: Option<String>) -> Self {
        Self {
            client,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            base_url: DEFAULT_BASE_URL.to_owned(),
        }
    }

    /// Create a provider reading its key from the named environment variable.
    pub fn from_env(client: reqwest::Client, var: &str) -> Self {
        Self::new(client, std::env::var(var).ok())
    }

    /// Point the provider at a different host (used by tests).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[derive(Debug, Deserialize)]
struct BraveResponse {
    #[serde(default)]
    web: Option<BraveWeb>,
}

#[derive(Debug, Deserialize)]
struct BraveWeb {
    #[serde(default)]
    results: Vec<BraveResult>,
}

#[derive(Debug, Deserialize)]
struct BraveResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    extra_snippets: Vec<String>,
}

#[async_trait]
impl SearchProvider for BraveProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Brave
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn search(&self, query: &str, count: usize) -> Result<Vec<SearchResult>, SearchError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(SearchError::ProviderUnavailable(
                "brave API key not configured".into(),
            ));
        };
        tracing::trace!(query, count, "brave search");

        let per_request = count.clamp(1, MAX_COUNT).to_string();
        let response = self
            .client
            .get(format!("{}/res/v1/web/search", self.base_url))
            .query(&[("q", query), ("count", per_request.as_str())])
            .header("Accept", "application/json")
            .header("X-Subscription-Token", api_key)
            .send()
            .await
            .map_err(|e| SearchError::Http(format!("brave request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(ProviderId::Brave, status));
        }

        let body: BraveResponse = response
            .json()
            .await
            .map_err(|e| SearchError::Parse(format!("brave response: {e}")))?;

        Ok(body
            .web
            .map(|web| web.results)
            .unwrap_or_default()
            .into_iter()
            .filter(|r| !r.url.trim().is_empty())
            .take(count)
            .map(|r| SearchResult {
                title: r.title,
                url: r.url,
                description: r.description,
                extra_snippets: r.extra_snippets,
                provider: ProviderId::Brave,
            })
            .collect())
    }
}
