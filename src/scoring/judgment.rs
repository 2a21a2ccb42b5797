//! Reading a model's scoring reply.

use scout_search::Candidate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::weights::{CriteriaScores, Criterion, ScoringWeights, compute_weighted_score};
use crate::error::{Result, ScoutError};
use crate::extract::extract_json;
use crate::fields::{field, list_field, number, root_object, text_field};

/// Coarse investment risk bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    Low,
    Medium,
    High,
}

impl RiskTier {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" | "med" | "moderate" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

/// Everything the model said about one candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringJudgment {
    pub scores: CriteriaScores,
    pub red_flags: Vec<String>,
    pub why_now: String,
    pub why_this_startup: String,
    pub comparables: Vec<String>,
    /// `None` when the model omitted it or used an unknown label.
    pub risk_tier: Option<RiskTier>,
}

/// A candidate with its judgment and reduced fit score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub candidate: Candidate,
    pub judgment: ScoringJudgment,
    pub fit_score: u8,
}

impl ScoredCandidate {
    pub fn new(candidate: Candidate, judgment: ScoringJudgment, weights: &ScoringWeights) -> Self {
        let fit_score = compute_weighted_score(&judgment.scores, weights);
        Self {
            candidate,
            judgment,
            fit_score,
        }
    }
}

/// Parse a scoring reply.
///
/// Sub-scores are read from a `scores` (or `criteria`) object when present,
/// otherwise from the top level, under `snake_case` or `camelCase` keys.
///
/// # Errors
///
/// [`ScoutError::MalformedModelOutput`] when no JSON can be recovered or
/// the reply carries none of the seven criteria.
pub fn parse_judgment(text: &str) -> Result<ScoringJudgment> {
    let malformed = || ScoutError::MalformedModelOutput {
        input_len: text.len(),
    };
    let value = extract_json(text)?;
    let obj = root_object(&value).ok_or_else(malformed)?;

    let score_source = field(
        obj,
        &["scores", "criteria", "criteria_scores", "criteriaScores", "subscores"],
    )
    .and_then(Value::as_object)
    .unwrap_or(obj);

    let scores = read_scores(score_source);
    if scores.is_empty() {
        return Err(malformed());
    }

    Ok(ScoringJudgment {
        scores,
        red_flags: list_field(obj, &["red_flags", "redFlags"]),
        why_now: text_field(obj, &["why_now", "whyNow"]),
        why_this_startup: text_field(obj, &["why_this_startup", "whyThisStartup"]),
        comparables: list_field(obj, &["comparables", "comps"]),
        risk_tier: field(obj, &["risk_tier", "riskTier", "risk"])
            .and_then(Value::as_str)
            .and_then(RiskTier::parse),
    })
}

fn read_scores(source: &Map<String, Value>) -> CriteriaScores {
    let mut scores = CriteriaScores::new();
    for criterion in Criterion::ALL {
        let keys = [criterion.key(), criterion.camel_key()];
        if let Some(score) = field(source, &keys).and_then(number) {
            scores.set(criterion, score);
        }
    }
    scores
}
