//! Shared fixtures for the root integration tests: a fintech thesis, a
//! keyword-routed search stub and an LLM stub that answers each prompt
//! kind with a canned reply.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use scout_search::{Aggregator, ProviderId, SearchConfig, SearchError, SearchProvider, SearchResult};
use serde_json::json;
use thesis_scout::config::PipelineConfig;
use thesis_scout::jobs::{ContinueQueue, JobStore, Orchestrator, PhaseContext};
use thesis_scout::llm::{CompletionOptions, LlmError, LlmProvider};
use thesis_scout::scoring::{Criterion, ScoringWeights};
use thesis_scout::thesis::ThesisInputs;

pub fn fintech_thesis() -> ThesisInputs {
    ThesisInputs {
        sectors: vec!["fintech".into()],
        stage: "seed".into(),
        geography: "france".into(),
        ..Default::default()
    }
}

pub fn result(title: &str, url: &str) -> SearchResult {
    SearchResult {
        title: title.to_owned(),
        url: url.to_owned(),
        description: format!("{title} snippet"),
        extra_snippets: vec![],
        provider: ProviderId::Brave,
    }
}

/// Returns the results of the first marker contained in the query,
/// `fallback` otherwise.
pub struct KeywordSearch {
    routes: Vec<(String, Vec<SearchResult>)>,
    fallback: Vec<SearchResult>,
}

#[async_trait]
impl SearchProvider for KeywordSearch {
    fn id(&self) -> ProviderId {
        ProviderId::Brave
    }

    async fn search(&self, query: &str, count: usize) -> Result<Vec<SearchResult>, SearchError> {
        let hits = self
            .routes
            .iter()
            .find(|(marker, _)| query.contains(marker.as_str()))
            .map_or(&self.fallback, |(_, r)| r);
        Ok(hits.iter().take(count).cloned().collect())
    }
}

/// 12 results over 3 hosts and 2 categories; DD queries get press hits.
pub fn fintech_search() -> KeywordSearch {
    let funding = vec![
        result("Qonto - Business account", "https://qonto.com/"),
        result("Qonto raises Series D", "https://www.qonto.com/blog/series-d"),
        result("Qonto pricing", "https://qonto.com/pricing"),
        result("Alan | Health insurance", "https://alan.com/"),
        result("Alan funding", "https://alan.com/press"),
        result("Alan careers", "https://alan.com/careers"),
    ];
    let news = vec![
        result("Qonto: the neobank for SMEs", "https://qonto.com/en"),
        result("Qonto expands to Italy", "https://qonto.com/it"),
        result("Qonto news", "https://qonto.com/news"),
        result("Alan jobs", "https://alan.com/jobs"),
        result("Swile - Meal vouchers", "https://www.swile.co/"),
        result("Swile raises", "https://swile.co/press"),
    ];
    KeywordSearch {
        routes: vec![
            ("seed fintech france funding".into(), funding),
            ("fintech france startup news".into(), news),
        ],
        fallback: vec![
            result("Qonto raises 486M", "https://techcrunch.com/qonto-486m"),
            result("Qonto founders", "https://lesechos.fr/qonto-founders"),
        ],
    }
}

pub fn empty_search() -> KeywordSearch {
    KeywordSearch {
        routes: vec![],
        fallback: vec![],
    }
}

pub const THESIS_REPLY: &str = r#"```json
{
  "summary": "Seed-stage French fintech serving SMEs",
  "keywords": ["sme", "banking"],
  "queries": [
    {"category": "funding", "query": "seed fintech france funding"},
    {"category": "news", "query": "fintech france startup news"}
  ]
}
```"#;

pub fn scoring_reply(score: f64) -> String {
    let scores: serde_json::Map<String, serde_json::Value> = Criterion::ALL
        .iter()
        .map(|c| (c.key().to_owned(), json!(score)))
        .collect();
    json!({
        "scores": scores,
        "red_flags": ["crowded market"],
        "why_now": "SME digitisation",
        "why_this_startup": "category leader",
        "comparables": ["Revolut Business"],
        "risk_tier": "low",
    })
    .to_string()
}

pub const DD_REPLY: &str = r#"{"summary": "Leading SME neobank in France",
  "funding": "Series D", "team": "Repeat founders", "traction": "400k customers",
  "competitors": ["Shine"], "strengths": ["distribution"], "risks": ["margin pressure"],
  "open_questions": ["path to profit"], "recommendation": "explore", "confidence": 72"#;

/// Answers thesis, scoring and due-diligence prompts. Scoring replies
/// depend on which company the prompt is about.
pub struct PipelineLlm {
    thesis_failures: AtomicUsize,
    pub calls: AtomicUsize,
}

impl PipelineLlm {
    pub fn new() -> Self {
        Self::failing_thesis(0)
    }

    /// Fail the first `n` thesis calls with a transient error.
    pub fn failing_thesis(n: usize) -> Self {
        Self {
            thesis_failures: AtomicUsize::new(n),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl LlmProvider for PipelineLlm {
    fn name(&self) -> &str {
        "pipeline-stub"
    }

    async fn complete(
        &self,
        _system: &str,
        user: &str,
        _options: &CompletionOptions,
    ) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if user.starts_with("Investment thesis:") {
            let left = self.thesis_failures.load(Ordering::SeqCst);
            if left > 0 {
                self.thesis_failures.store(left - 1, Ordering::SeqCst);
                return Err(LlmError::Provider("upstream 502".into()));
            }
            return Ok(THESIS_REPLY.to_owned());
        }
        if user.contains("\"evidence\"") {
            // Truncated on purpose; the extractor closes the object.
            return Ok(DD_REPLY.to_owned());
        }
        let score = if user.contains("qonto.com") {
            85.0
        } else if user.contains("alan.com") {
            60.0
        } else {
            30.0
        };
        Ok(scoring_reply(score))
    }
}

pub fn pipeline_config() -> PipelineConfig {
    PipelineConfig {
        batch_delay_ms: 0,
        ..PipelineConfig::default()
    }
}

pub fn context(
    search: KeywordSearch,
    llm: Arc<dyn LlmProvider>,
    pipeline: PipelineConfig,
) -> PhaseContext {
    let config = SearchConfig {
        cache_ttl_seconds: 0,
        base_backoff_ms: 1,
        max_backoff_ms: 2,
        ..SearchConfig::default()
    };
    let aggregator = Aggregator::new(vec![Arc::new(search)], config).expect("aggregator");
    PhaseContext {
        aggregator: Arc::new(aggregator),
        llm,
        pipeline,
        weights: ScoringWeights::default(),
        completion: CompletionOptions::default(),
    }
}

pub fn orchestrator<S>(store: Arc<S>, ctx: PhaseContext) -> Arc<Orchestrator>
where
    S: JobStore + ContinueQueue + 'static,
{
    Arc::new(Orchestrator::new(store.clone(), store, ctx))
}
