//! # scout-search
//!
//! Multi-provider web search and candidate ranking for thesis-scout.
//!
//! ## Design
//!
//! - Calls search provider APIs (Brave, Serper) through one trait
//! - Cost-aware fallback: the primary is asked first, secondaries only
//!   cover its shortfall
//! - Rate-limited calls (429/503) are retried with exponential backoff
//!   under a hard per-call timeout
//! - Per-provider circuit breaker and TTL query cache, both owned by the
//!   [`Aggregator`] instance
//! - Results are merged into one [`Candidate`] per organisation and ranked
//!   by signal diversity
//!
//! ## Security
//!
//! - API keys are read from environment variables and never logged
//! - Search queries are logged only at debug/trace level

pub mod cache;
pub mod circuit_breaker;
pub mod config;
pub mod error;
pub mod http;
pub mod orchestrator;
pub mod provider;
pub mod providers;
pub mod types;

pub use config::SearchConfig;
pub use error::{Result, SearchError};
pub use orchestrator::candidates::{Candidate, MAX_DESCRIPTIONS, rank_candidates};
pub use orchestrator::search::Aggregator;
pub use provider::SearchProvider;
pub use types::{CategorizedResult, ProviderId, SearchResult};
