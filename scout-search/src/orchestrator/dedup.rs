//! Cross-provider result deduplication by normalised URL.
//!
//! The first occurrence of a URL wins. Callers feed primary results
//! before secondary ones, so the primary's copy is the one kept.

use std::collections::HashSet;

use crate::types::SearchResult;

use super::url_normalize::normalize_url;

/// Deduplicate results by [`normalize_url`], preserving input order and
/// keeping the first occurrence. Results with a blank URL are dropped.
pub fn dedup_first_occurrence(results: Vec<SearchResult>) -> Vec<SearchResult> {
    let mut seen = HashSet::with_capacity(results.len());
    results
        .into_iter()
        .filter(|r| !r.url.trim().is_empty())
        .filter(|r| seen.insert(normalize_url(&r.url)))
        .collect()
}
