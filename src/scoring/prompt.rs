//! Scoring request shaping.

use scout_search::Candidate;
use serde_json::json;

use crate::error::Result;
use crate::thesis::{ThesisInputs, ThesisSummary};

const SCORING_SYSTEM_PROMPT: &str = include_str!("../../prompts/scoring.md");

/// Descriptions sent per candidate; the ranker keeps more than the model needs.
pub const PROMPT_DESCRIPTIONS: usize = 5;

/// Prompt pair asking the model to judge `candidate` against the thesis.
///
/// # Errors
///
/// Fails only if the payload cannot be serialized.
pub fn build_scoring_prompt(
    candidate: &Candidate,
    inputs: &ThesisInputs,
    summary: &ThesisSummary,
) -> Result<(String, String)> {
    let company = json!({
        "name": candidate.name,
        "url": candidate.canonical_url,
        "providers": candidate.providers,
        "categories": candidate.categories,
        "mention_count": candidate.mention_count,
        "descriptions": candidate
            .descriptions
            .iter()
            .take(PROMPT_DESCRIPTIONS)
            .collect::<Vec<_>>(),
    });
    let thesis = json!({
        "criteria": inputs,
        "summary": summary.summary,
        "keywords": summary.keywords,
    });
    let user = format!(
        "Thesis:\n{}\n\nCompany:\n{}",
        serde_json::to_string_pretty(&thesis)?,
        serde_json::to_string_pretty(&company)?
    );
    Ok((SCORING_SYSTEM_PROMPT.to_owned(), user))
}
