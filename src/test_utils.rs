//! Shared test utilities used across multiple test modules.
//!
//! Stub search and LLM providers plus a ready-made [`PhaseContext`], so
//! phase, orchestrator and host tests never touch the network.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use scout_search::{
    Aggregator, Candidate, ProviderId, SearchConfig, SearchError, SearchProvider, SearchResult,
};

use crate::config::PipelineConfig;
use crate::jobs::PhaseContext;
use crate::llm::{CompletionOptions, LlmError, LlmProvider};
use crate::scoring::{Criterion, ScoringWeights};

/// Search provider returning a fixed result list for every query.
pub struct StubSearch {
    results: Vec<SearchResult>,
}

impl StubSearch {
    pub fn empty() -> Self {
        Self { results: vec![] }
    }

    pub fn with_results(results: Vec<SearchResult>) -> Self {
        Self { results }
    }
}

#[async_trait]
impl SearchProvider for StubSearch {
    fn id(&self) -> ProviderId {
        ProviderId::Brave
    }

    async fn search(&self, _query: &str, count: usize) -> Result<Vec<SearchResult>, SearchError> {
        Ok(self.results.iter().take(count).cloned().collect())
    }
}

enum Reply {
    Always(String),
    ByMarker(Vec<(String, String)>),
    Fail(LlmError),
    Slow(Duration, String),
}

/// LLM returning canned text.
pub struct StubLlm {
    reply: Reply,
    calls: AtomicUsize,
}

impl StubLlm {
    /// Same text for every prompt.
    pub fn always(text: &str) -> Self {
        Self::new(Reply::Always(text.to_owned()))
    }

    /// Text of the first pair whose marker occurs in the user prompt.
    /// Unmatched prompts get an empty reply.
    pub fn by_marker(pairs: Vec<(&str, String)>) -> Self {
        Self::new(Reply::ByMarker(
            pairs.into_iter().map(|(m, t)| (m.to_owned(), t)).collect(),
        ))
    }

    /// Fail every call with `error`.
    pub fn failing(error: LlmError) -> Self {
        Self::new(Reply::Fail(error))
    }

    /// Reply with `text` after sleeping for `delay`.
    pub fn slow(delay: Duration, text: &str) -> Self {
        Self::new(Reply::Slow(delay, text.to_owned()))
    }

    fn new(reply: Reply) -> Self {
        Self {
            reply,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmProvider for StubLlm {
    fn name(&self) -> &str {
        "stub"
    }

    async fn complete(
        &self,
        _system: &str,
        user: &str,
        _options: &CompletionOptions,
    ) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.reply {
            Reply::Always(text) => Ok(text.clone()),
            Reply::ByMarker(pairs) => Ok(pairs
                .iter()
                .find(|(marker, _)| user.contains(marker.as_str()))
                .map(|(_, text)| text.clone())
                .unwrap_or_default()),
            Reply::Fail(e) => Err(e.clone()),
            Reply::Slow(delay, text) => {
                tokio::time::sleep(*delay).await;
                Ok(text.clone())
            }
        }
    }
}

/// Handlers' context over one stub search provider, with no batch delay.
pub fn test_context(search: StubSearch, llm: StubLlm) -> PhaseContext {
    test_context_with(search, Arc::new(llm))
}

pub fn test_context_with(search: StubSearch, llm: Arc<dyn LlmProvider>) -> PhaseContext {
    let config = SearchConfig {
        cache_ttl_seconds: 0,
        ..SearchConfig::default()
    };
    let aggregator = Aggregator::new(vec![Arc::new(search)], config).expect("stub aggregator");
    PhaseContext {
        aggregator: Arc::new(aggregator),
        llm,
        pipeline: PipelineConfig {
            batch_delay_ms: 0,
            ..PipelineConfig::default()
        },
        weights: ScoringWeights::default(),
        completion: CompletionOptions::default(),
    }
}

pub fn candidate(hostname: &str) -> Candidate {
    Candidate {
        name: hostname.split('.').next().unwrap_or(hostname).to_owned(),
        canonical_url: format!("https://{hostname}/"),
        hostname: hostname.to_owned(),
        descriptions: vec![format!("{hostname} builds payment tools for SMEs")],
        mention_count: 1,
        categories: BTreeSet::from(["funding".to_owned()]),
        providers: BTreeSet::from([ProviderId::Brave]),
        score: 1,
    }
}

/// Scoring reply with every criterion at `score`.
pub fn scoring_reply(score: f64) -> String {
    let scores: serde_json::Map<String, serde_json::Value> = Criterion::ALL
        .iter()
        .map(|c| (c.key().to_owned(), serde_json::json!(score)))
        .collect();
    serde_json::json!({
        "scores": scores,
        "red_flags": [],
        "why_now": "market timing",
        "why_this_startup": "strong team",
        "comparables": ["Qonto"],
        "risk_tier": "medium",
    })
    .to_string()
}

pub fn search_result(url: &str, title: &str) -> SearchResult {
    SearchResult {
        title: title.to_owned(),
        url: url.to_owned(),
        description: format!("{title} raises seed round"),
        extra_snippets: vec![],
        provider: ProviderId::Brave,
    }
}
