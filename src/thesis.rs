//! Investment thesis inputs and the thesis-analysis step.
//!
//! The analysis asks the model for a short summary, focus keywords and a
//! set of category-labelled web queries. When the model returns no usable
//! queries, [`default_queries`] derives them from the inputs so sourcing
//! can still run.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, ScoutError};
use crate::extract::extract_json;
use crate::fields::{field, list_field, root_object, text, text_field};

const THESIS_SYSTEM_PROMPT: &str = include_str!("../prompts/thesis.md");

/// Category assigned to model queries that carry no label.
const DEFAULT_CATEGORY: &str = "general";

/// Caller-supplied investment criteria.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThesisInputs {
    pub sectors: Vec<String>,
    #[serde(default)]
    pub stage: String,
    #[serde(default)]
    pub geography: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket_size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl ThesisInputs {
    /// At least one non-blank sector is required.
    ///
    /// # Errors
    ///
    /// Returns [`ScoutError::InvalidInput`].
    pub fn validate(&self) -> Result<()> {
        if self.sectors.iter().all(|s| s.trim().is_empty()) {
            return Err(ScoutError::InvalidInput(
                "thesis needs at least one sector".into(),
            ));
        }
        Ok(())
    }

    fn sectors(&self) -> impl Iterator<Item = &str> {
        self.sectors.iter().map(|s| s.trim()).filter(|s| !s.is_empty())
    }
}

/// One web query with the category label its results are tagged with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcingQuery {
    pub category: String,
    pub query: String,
}

impl SourcingQuery {
    pub fn new(category: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            category: category.into().trim().to_lowercase(),
            query: collapse_whitespace(&query.into()),
        }
    }
}

/// Output of the thesis-analysis step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThesisSummary {
    pub summary: String,
    pub keywords: Vec<String>,
    pub queries: Vec<SourcingQuery>,
}

/// Prompt pair for the thesis-analysis call.
///
/// # Errors
///
/// Fails only if the inputs cannot be serialized.
pub fn build_thesis_prompt(inputs: &ThesisInputs) -> Result<(String, String)> {
    let user = format!(
        "Investment thesis:\n{}\n\nReturn the JSON object described above.",
        serde_json::to_string_pretty(inputs)?
    );
    Ok((THESIS_SYSTEM_PROMPT.to_owned(), user))
}

/// Parse the analysis reply, filling in default queries when needed.
///
/// # Errors
///
/// [`ScoutError::MalformedModelOutput`] when no JSON object can be recovered.
pub fn parse_thesis_summary(text_in: &str, inputs: &ThesisInputs) -> Result<ThesisSummary> {
    let value = extract_json(text_in)?;
    let obj = root_object(&value).ok_or(ScoutError::MalformedModelOutput {
        input_len: text_in.len(),
    })?;

    let mut queries = Vec::new();
    if let Some(Value::Array(items)) = field(obj, &["queries", "search_queries", "searchQueries"]) {
        for item in items {
            let query = match item {
                Value::Object(q) => {
                    let query = text_field(q, &["query", "q"]);
                    let category = text_field(q, &["category", "label", "type"]);
                    let category = if category.is_empty() {
                        DEFAULT_CATEGORY.to_owned()
                    } else {
                        category
                    };
                    SourcingQuery::new(category, query)
                }
                other => match text(other) {
                    Some(q) => SourcingQuery::new(DEFAULT_CATEGORY, q),
                    None => continue,
                },
            };
            if !query.query.is_empty() {
                queries.push(query);
            }
        }
    }
    dedup_queries(&mut queries);
    if queries.is_empty() {
        tracing::debug!("thesis reply has no queries, deriving defaults");
        queries = default_queries(inputs);
    }

    Ok(ThesisSummary {
        summary: text_field(obj, &["summary", "thesis_summary", "thesisSummary"]),
        keywords: list_field(obj, &["keywords", "focus_keywords", "focusKeywords"]),
        queries,
    })
}

/// Queries derived from the inputs alone, one set per sector.
pub fn default_queries(inputs: &ThesisInputs) -> Vec<SourcingQuery> {
    let stage = inputs.stage.trim();
    let geo = inputs.geography.trim();
    let mut queries = Vec::new();
    for sector in inputs.sectors() {
        queries.push(SourcingQuery::new(
            "funding",
            format!("{stage} {sector} startup {geo} raises funding round"),
        ));
        queries.push(SourcingQuery::new(
            "news",
            format!("{sector} startup {geo} launch news"),
        ));
        queries.push(SourcingQuery::new(
            "accelerator",
            format!("{sector} startups {geo} accelerator batch"),
        ));
        queries.push(SourcingQuery::new(
            "directory",
            format!("top {stage} {sector} startups {geo}"),
        ));
    }
    dedup_queries(&mut queries);
    queries
}

/// Drop repeated queries (case-insensitive), keeping the first.
fn dedup_queries(queries: &mut Vec<SourcingQuery>) {
    let mut seen = std::collections::HashSet::new();
    queries.retain(|q| seen.insert(q.query.to_lowercase()));
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    fn fintech() -> ThesisInputs {
        ThesisInputs {
            sectors: vec!["fintech".into()],
            stage: "seed".into(),
            geography: "france".into(),
            ticket_size: Some("500k-2M EUR".into()),
            notes: None,
        }
    }

    #[test]
    fn validate_requires_a_sector() {
        assert!(fintech().validate().is_ok());
        let empty = ThesisInputs {
            sectors: vec!["  ".into()],
            ..fintech()
        };
        assert_eq!(empty.validate().unwrap_err().code(), "INVALID_INPUT");
    }

    #[test]
    fn prompt_embeds_inputs() {
        let (system, user) = build_thesis_prompt(&fintech()).unwrap();
        assert!(!system.is_empty());
        assert!(user.contains("fintech"));
        assert!(user.contains("500k-2M EUR"));
    }

    #[test]
    fn parses_labelled_queries() {
        let reply = r#"```json
{"summary": "Seed fintech in France",
 "keywords": ["payments", "sme"],
 "queries": [
   {"category": "Funding", "query": "seed  fintech france funding"},
   {"category": "news", "query": "fintech france news"},
   {"query": "Seed fintech France funding"},
   "french neobank startups"
 ]}
```"#;
        let summary = parse_thesis_summary(reply, &fintech()).unwrap();
        assert_eq!(summary.summary, "Seed fintech in France");
        assert_eq!(summary.keywords, vec!["payments", "sme"]);
        assert_eq!(
            summary.queries,
            vec![
                SourcingQuery::new("funding", "seed fintech france funding"),
                SourcingQuery::new("news", "fintech france news"),
                SourcingQuery::new("general", "french neobank startups"),
            ]
        );
    }

    #[test]
    fn missing_queries_fall_back_to_defaults() {
        let summary = parse_thesis_summary(r#"{"summary": "x"}"#, &fintech()).unwrap();
        assert_eq!(summary.queries, default_queries(&fintech()));
        assert_eq!(summary.queries.len(), 4);
    }

    #[test]
    fn default_queries_cover_each_sector_and_category() {
        let inputs = ThesisInputs {
            sectors: vec!["fintech".into(), "insurtech".into()],
            ..fintech()
        };
        let queries = default_queries(&inputs);
        assert_eq!(queries.len(), 8);
        assert!(queries.iter().all(|q| !q.query.contains("  ")));
        let categories: std::collections::BTreeSet<_> =
            queries.iter().map(|q| q.category.as_str()).collect();
        assert_eq!(categories.len(), 4);
    }

    #[test]
    fn prose_only_reply_is_malformed() {
        let err = parse_thesis_summary("I think fintech is great.", &fintech()).unwrap_err();
        assert_eq!(err.code(), "MALFORMED_MODEL_OUTPUT");
    }
}
