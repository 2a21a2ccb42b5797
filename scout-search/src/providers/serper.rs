//! Serper (Google results) API provider.
//!
//! Paid per query, so the aggregator only calls it to cover a shortfall
//! from the primary.

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::SearchError;
use crate::http::classify_status;
use crate::provider::SearchProvider;
use crate::types::{ProviderId, SearchResult};

const DEFAULT_BASE_URL: &str = "https://google.serper.dev";

/// Serper caps `num` at 100 per request.
const MAX_COUNT: usize = 100;

/// Serper search API client.
pub struct SerperProvider {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
}

impl SerperProvider {
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
struct SerperResponse {
    #[serde(default)]
    organic: Vec<SerperOrganic>,
}

#[derive(Debug, Deserialize)]
struct SerperOrganic {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    sitelinks: Vec<SerperSitelink>,
}

#[derive(Debug, Deserialize)]
struct SerperSitelink {
    #[serde(default)]
    title: String,
}

#[async_trait]
impl SearchProvider for SerperProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Serper
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn search(&self, query: &str, count: usize) -> Result<Vec<SearchResult>, SearchError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(SearchError::ProviderUnavailable(
                "serper API key not configured".into(),
            ));
        };
        tracing::trace!(query, count, "serper search");

        let response = self
            .client
            .post(format!("{}/search", self.base_url))
            .header("X-API-KEY", api_key)
            .json(&serde_json::json!({
                "q": query,
                "num": count.clamp(1, MAX_COUNT),
            }))
            .send()
            .await
            .map_err(|e| SearchError::Http(format!("serper request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(ProviderId::Serper, status));
        }

        let body: SerperResponse = response
            .json()
            .await
            .map_err(|e| SearchError::Parse(format!("serper response: {e}")))?;

        Ok(body
            .organic
            .into_iter()
            .filter(|r| !r.link.trim().is_empty())
            .take(count)
            .map(|r| SearchResult {
                title: r.title,
                url: r.link,
                description: r.snippet,
                extra_snippets: r
                    .sitelinks
                    .into_iter()
                    .map(|s| s.title)
                    .filter(|t| !t.is_empty())
                    .collect(),
                provider: ProviderId::Serper,
            })
            .collect())
    }
}
