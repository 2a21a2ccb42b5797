//! Weighted multi-criteria scoring.
//!
//! The engine shapes scoring requests and reduces the replies; calling
//! the model is the LLM chain's job.

pub mod judgment;
pub mod prompt;
pub mod weights;

pub use judgment::{RiskTier, ScoredCandidate, ScoringJudgment, parse_judgment};
pub use prompt::build_scoring_prompt;
pub use weights::{CriteriaScores, Criterion, ScoringWeights, compute_weighted_score};
