//! Due-diligence search and analysis for the picked company.

use std::collections::HashSet;

use scout_search::{Candidate, SearchResult};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::{Result, ScoutError};
use crate::extract::extract_json;
use crate::fields::{field, list_field, number, root_object, text_field};
use crate::scoring::ScoredCandidate;
use crate::thesis::{SourcingQuery, ThesisInputs, ThesisSummary};

const DILIGENCE_SYSTEM_PROMPT: &str = include_str!("../prompts/diligence.md");

/// Results per topic forwarded to the model.
const MAX_EVIDENCE_PER_TOPIC: usize = 5;

/// Evidence topics, in prompt order.
pub const DD_TOPICS: [&str; 5] = ["funding", "team", "news", "competitors", "traction"];

/// Search results gathered for one topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DdEvidence {
    pub topic: String,
    pub query: String,
    pub results: Vec<SearchResult>,
}

/// Memo verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Recommendation {
    Pass,
    Explore,
    Prioritize,
}

impl Recommendation {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pass" => Some(Self::Pass),
            "explore" => Some(Self::Explore),
            "prioritize" | "prioritise" => Some(Self::Prioritize),
            _ => None,
        }
    }
}

/// The model's due-diligence memo.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DdReport {
    pub summary: String,
    pub funding: String,
    pub team: String,
    pub traction: String,
    pub competitors: Vec<String>,
    pub strengths: Vec<String>,
    pub risks: Vec<String>,
    pub open_questions: Vec<String>,
    pub recommendation: Option<Recommendation>,
    /// 0–100.
    pub confidence: Option<u8>,
}

/// Final job payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalReport {
    pub thesis: ThesisSection,
    pub company: ScoredCandidate,
    pub report: DdReport,
    /// Distinct evidence URLs, in topic order.
    pub sources: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThesisSection {
    pub inputs: ThesisInputs,
    pub summary: ThesisSummary,
}

/// One query per topic about `candidate`.
pub fn dd_queries(candidate: &Candidate) -> Vec<SourcingQuery> {
    let name = &candidate.name;
    let host = &candidate.hostname;
    DD_TOPICS
        .iter()
        .map(|&topic| {
            let query = match topic {
                "funding" => format!("\"{name}\" {host} funding round investors"),
                "team" => format!("\"{name}\" founders CEO team"),
                "news" => format!("\"{name}\" {host} news"),
                "competitors" => format!("\"{name}\" competitors alternatives"),
                _ => format!("\"{name}\" customers revenue growth"),
            };
            SourcingQuery::new(topic, query)
        })
        .collect()
}

/// Prompt pair for the memo.
///
/// # Errors
///
/// Fails only if the payload cannot be serialized.
pub fn build_dd_prompt(
    inputs: &ThesisInputs,
    summary: &ThesisSummary,
    picked: &ScoredCandidate,
    evidence: &[DdEvidence],
) -> Result<(String, String)> {
    let evidence_json: Vec<Value> = evidence
        .iter()
        .map(|e| {
            let results: Vec<Value> = e
                .results
                .iter()
                .take(MAX_EVIDENCE_PER_TOPIC)
                .map(|r| json!({"title": r.title, "url": r.url, "snippet": r.description}))
                .collect();
            json!({"topic": e.topic, "results": results})
        })
        .collect();

    let payload = json!({
        "thesis": {"criteria": inputs, "summary": summary.summary},
        "company": {
            "name": picked.candidate.name,
            "url": picked.candidate.canonical_url,
            "fit_score": picked.fit_score,
            "judgment": picked.judgment,
        },
        "evidence": evidence_json,
    });
    let user = serde_json::to_string_pretty(&payload)?;
    Ok((DILIGENCE_SYSTEM_PROMPT.to_owned(), user))
}

/// Parse the memo reply.
///
/// # Errors
///
/// [`ScoutError::MalformedModelOutput`] when no JSON is recoverable or the
/// memo has neither a summary nor any strengths or risks.
pub fn parse_dd_report(text: &str) -> Result<DdReport> {
    let malformed = || ScoutError::MalformedModelOutput {
        input_len: text.len(),
    };
    let value = extract_json(text)?;
    let obj = root_object(&value).ok_or_else(malformed)?;

    let report = DdReport {
        summary: text_field(obj, &["summary", "executive_summary", "executiveSummary"]),
        funding: text_field(obj, &["funding"]),
        team: text_field(obj, &["team"]),
        traction: text_field(obj, &["traction"]),
        competitors: list_field(obj, &["competitors"]),
        strengths: list_field(obj, &["strengths"]),
        risks: list_field(obj, &["risks"]),
        open_questions: list_field(obj, &["open_questions", "openQuestions"]),
        recommendation: field(obj, &["recommendation"])
            .and_then(Value::as_str)
            .and_then(Recommendation::parse),
        confidence: field(obj, &["confidence"])
            .and_then(number)
            .filter(|c| c.is_finite())
            .map(|c| c.round().clamp(0.0, 100.0) as u8),
    };

    if report.summary.is_empty() && report.strengths.is_empty() && report.risks.is_empty() {
        return Err(malformed());
    }
    Ok(report)
}

/// Assemble the payload stored on the job at `dd_done`.
pub fn final_report(
    inputs: &ThesisInputs,
    summary: &ThesisSummary,
    picked: &ScoredCandidate,
    report: DdReport,
    evidence: &[DdEvidence],
) -> FinalReport {
    let mut seen = HashSet::new();
    let sources = evidence
        .iter()
        .flat_map(|e| e.results.iter())
        .map(|r| r.url.trim())
        .filter(|u| !u.is_empty() && seen.insert(*u))
        .map(String::from)
        .collect();

    FinalReport {
        thesis: ThesisSection {
            inputs: inputs.clone(),
            summary: summary.clone(),
        },
        company: picked.clone(),
        report,
        sources,
    }
}
