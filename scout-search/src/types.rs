//! Core types for search results and provider identification.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single search result returned by a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// The title of the result page.
    pub title: String,
    /// The URL of the result.
    pub url: String,
    /// The main snippet describing the page.
    pub description: String,
    /// Additional snippets some providers return alongside the main one.
    #[serde(default)]
    pub extra_snippets: Vec<String>,
    /// Which provider returned this result.
    pub provider: ProviderId,
}

/// A search result tagged with the category label of the query that
/// produced it (e.g. `funding`, `news`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorizedResult {
    /// Category label of the originating query.
    pub category: String,
    /// The raw provider result.
    pub result: SearchResult,
}

impl CategorizedResult {
    /// Tag a result with a category label.
    pub fn new(category: impl Into<String>, result: SearchResult) -> Self {
        Self {
            category: category.into(),
            result,
        }
    }
}

/// Search providers the aggregator knows how to call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    /// Brave Web Search API. Generous free tier, used as the primary.
    Brave,
    /// Serper (Google results). Paid per query, used for shortfalls.
    Serper,
}

impl ProviderId {
    /// Returns the wire/config name of this provider.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Brave => "brave",
            Self::Serper => "serper",
        }
    }

    /// Parse a provider from its config name (case-insensitive).
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "brave" => Some(Self::Brave),
            "serper" => Some(Self::Serper),
            _ => None,
        }
    }

    /// Returns all provider variants in default preference order.
    pub fn all() -> &'static [ProviderId] {
        &[Self::Brave, Self::Serper]
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
