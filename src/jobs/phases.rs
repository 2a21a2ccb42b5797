//! Phase handlers.
//!
//! A handler reads the persisted job plus injected collaborators and
//! returns the step's output. It never writes; the orchestrator applies
//! the output under a version check.

use std::sync::Arc;
use std::time::Duration;

use scout_search::{Aggregator, Candidate, CategorizedResult, rank_candidates};
use serde::de::DeserializeOwned;

use super::batch::run_batched;
use super::types::{Job, Step};
use crate::config::PipelineConfig;
use crate::diligence::{DdEvidence, build_dd_prompt, dd_queries, final_report, parse_dd_report};
use crate::error::{Result, ScoutError};
use crate::llm::{CompletionOptions, LlmProvider};
use crate::scoring::{ScoredCandidate, ScoringWeights, build_scoring_prompt, parse_judgment};
use crate::thesis::{ThesisSummary, build_thesis_prompt, parse_thesis_summary};

/// Collaborators shared by every handler.
#[derive(Clone)]
pub struct PhaseContext {
    pub aggregator: Arc<Aggregator>,
    pub llm: Arc<dyn LlmProvider>,
    pub pipeline: PipelineConfig,
    pub weights: ScoringWeights,
    pub completion: CompletionOptions,
}

impl PhaseContext {
    fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.pipeline.batch_delay_ms)
    }
}

/// What a step produced.
#[derive(Debug, Clone)]
pub enum PhaseOutput {
    Thesis(ThesisSummary),
    Sourced(Vec<Candidate>),
    Picked {
        picked: ScoredCandidate,
        /// Every candidate that scored, in ranking order. Empty when the
        /// pick was reused from an earlier run.
        pool: Vec<ScoredCandidate>,
    },
    Evidence(Vec<DdEvidence>),
    Report(serde_json::Value),
}

impl PhaseOutput {
    /// Write the output onto `job`. Does not touch the phase.
    pub fn apply(self, job: &mut Job) -> Result<()> {
        match self {
            Self::Thesis(summary) => job.thesis_summary = Some(summary),
            Self::Sourced(candidates) => job.checkpoint = Some(serde_json::to_value(candidates)?),
            Self::Picked { picked, pool } => {
                if job.picked_candidate.is_none() {
                    job.picked_candidate = Some(picked);
                }
                if !pool.is_empty() {
                    job.checkpoint = Some(serde_json::to_value(pool)?);
                }
            }
            Self::Evidence(evidence) => job.checkpoint = Some(serde_json::to_value(evidence)?),
            Self::Report(report) => job.result_payload = Some(report),
        }
        Ok(())
    }
}

/// Run one step's handler against the job as persisted.
pub async fn run_step(ctx: &PhaseContext, step: Step, job: &Job) -> Result<PhaseOutput> {
    match step {
        Step::Thesis => analyze_thesis(ctx, job).await,
        Step::Sourcing => source_candidates(ctx, job).await,
        Step::Picking => pick_candidate(ctx, job).await,
        Step::DdSearch => search_evidence(ctx, job).await,
        Step::DdAnalyze => analyze_evidence(ctx, job).await,
    }
}

async fn analyze_thesis(ctx: &PhaseContext, job: &Job) -> Result<PhaseOutput> {
    let (system, user) = build_thesis_prompt(&job.thesis_inputs)?;
    let text = ctx.llm.complete(&system, &user, &ctx.completion).await?;
    let mut summary = parse_thesis_summary(&text, &job.thesis_inputs)?;
    summary.queries.truncate(ctx.pipeline.max_queries);
    tracing::info!(
        job_id = %job.id,
        keywords = summary.keywords.len(),
        queries = summary.queries.len(),
        "thesis analyzed"
    );
    Ok(PhaseOutput::Thesis(summary))
}

async fn source_candidates(ctx: &PhaseContext, job: &Job) -> Result<PhaseOutput> {
    let summary = require(job, job.thesis_summary.as_ref(), "thesis summary")?;
    let queries: Vec<_> = summary
        .queries
        .iter()
        .take(ctx.pipeline.max_queries)
        .cloned()
        .collect();
    let query_count = queries.len();
    let per_query = ctx.pipeline.results_per_query;

    let batches = run_batched(queries, ctx.pipeline.batch_size, ctx.batch_delay(), |q| {
        let aggregator = Arc::clone(&ctx.aggregator);
        async move {
            tracing::debug!(category = %q.category, query = %q.query, "sourcing query");
            aggregator
                .search_all(&q.query, per_query)
                .await
                .into_iter()
                .map(|r| CategorizedResult::new(q.category.clone(), r))
                .collect::<Vec<_>>()
        }
    })
    .await;

    let results: Vec<CategorizedResult> = batches.into_iter().flatten().collect();
    let result_count = results.len();
    let mut candidates = rank_candidates(results);
    if candidates.is_empty() {
        return Err(ScoutError::Search(format!(
            "{query_count} sourcing queries produced no candidates"
        )));
    }
    candidates.truncate(ctx.pipeline.max_candidates);
    tracing::info!(
        job_id = %job.id,
        queries = query_count,
        results = result_count,
        candidates = candidates.len(),
        "sourcing complete"
    );
    Ok(PhaseOutput::Sourced(candidates))
}

async fn pick_candidate(ctx: &PhaseContext, job: &Job) -> Result<PhaseOutput> {
    if let Some(existing) = &job.picked_candidate {
        tracing::debug!(job_id = %job.id, "reusing existing pick");
        return Ok(PhaseOutput::Picked {
            picked: existing.clone(),
            pool: Vec::new(),
        });
    }

    let summary = require(job, job.thesis_summary.as_ref(), "thesis summary")?;
    let candidates: Vec<Candidate> = checkpoint(job, "ranked candidates")?;
    let pool: Vec<Candidate> = candidates
        .into_iter()
        .take(ctx.pipeline.pick_pool_size)
        .collect();
    if pool.is_empty() {
        return Err(ScoutError::Search("no candidates to pick from".into()));
    }

    let scored = run_batched(pool, ctx.pipeline.batch_size, ctx.batch_delay(), |candidate| {
        score_one(ctx, job, summary, candidate)
    })
    .await;

    let mut last_err = None;
    let mut ok = Vec::with_capacity(scored.len());
    for outcome in scored {
        match outcome {
            Ok(s) => ok.push(s),
            Err(e) => {
                tracing::warn!(job_id = %job.id, error = %e, "candidate scoring failed");
                last_err = Some(e);
            }
        }
    }

    // Highest fit wins; ties keep the better-ranked candidate.
    let mut best: Option<&ScoredCandidate> = None;
    for s in &ok {
        if best.is_none_or(|b| s.fit_score > b.fit_score) {
            best = Some(s);
        }
    }
    let picked = match best {
        Some(b) => b.clone(),
        None => {
            return Err(last_err
                .unwrap_or_else(|| ScoutError::Llm("no candidate could be scored".into())));
        }
    };

    tracing::info!(
        job_id = %job.id,
        scored = ok.len(),
        picked = %picked.candidate.hostname,
        fit_score = picked.fit_score,
        "candidate picked"
    );
    Ok(PhaseOutput::Picked { picked, pool: ok })
}

async fn score_one(
    ctx: &PhaseContext,
    job: &Job,
    summary: &ThesisSummary,
    candidate: Candidate,
) -> Result<ScoredCandidate> {
    let (system, user) = build_scoring_prompt(&candidate, &job.thesis_inputs, summary)?;
    let text = ctx.llm.complete(&system, &user, &ctx.completion).await?;
    let judgment = parse_judgment(&text)?;
    Ok(ScoredCandidate::new(candidate, judgment, &ctx.weights))
}

async fn search_evidence(ctx: &PhaseContext, job: &Job) -> Result<PhaseOutput> {
    let picked = require(job, job.picked_candidate.as_ref(), "picked candidate")?;
    let per_query = ctx.pipeline.dd_results_per_query;

    let evidence = run_batched(
        dd_queries(&picked.candidate),
        ctx.pipeline.batch_size,
        ctx.batch_delay(),
        |q| {
            let aggregator = Arc::clone(&ctx.aggregator);
            async move {
                let results = aggregator.search_all(&q.query, per_query).await;
                DdEvidence {
                    topic: q.category,
                    query: q.query,
                    results,
                }
            }
        },
    )
    .await;

    let found: usize = evidence.iter().map(|e| e.results.len()).sum();
    tracing::info!(
        job_id = %job.id,
        topics = evidence.len(),
        results = found,
        "dd search complete"
    );
    Ok(PhaseOutput::Evidence(evidence))
}

async fn analyze_evidence(ctx: &PhaseContext, job: &Job) -> Result<PhaseOutput> {
    let summary = require(job, job.thesis_summary.as_ref(), "thesis summary")?;
    let picked = require(job, job.picked_candidate.as_ref(), "picked candidate")?;
    let evidence: Vec<DdEvidence> = checkpoint(job, "due-diligence evidence")?;

    let (system, user) = build_dd_prompt(&job.thesis_inputs, summary, picked, &evidence)?;
    let text = ctx.llm.complete(&system, &user, &ctx.completion).await?;
    let report = parse_dd_report(&text)?;
    let recommendation = report.recommendation;
    let payload = final_report(&job.thesis_inputs, summary, picked, report, &evidence);

    tracing::info!(job_id = %job.id, recommendation = ?recommendation, "dd analysis complete");
    Ok(PhaseOutput::Report(serde_json::to_value(payload)?))
}

fn require<'a, T>(job: &Job, value: Option<&'a T>, what: &str) -> Result<&'a T> {
    value.ok_or_else(|| ScoutError::Store(format!("job {} has no {what}", job.id)))
}

fn checkpoint<T: DeserializeOwned>(job: &Job, what: &str) -> Result<T> {
    let raw = require(job, job.checkpoint.as_ref(), what)?;
    Ok(serde_json::from_value(raw.clone())?)
}
