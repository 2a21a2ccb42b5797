//! thesis-scout: resumable sourcing, scoring and due-diligence pipeline.
//!
//! A job walks five steps against an investment thesis:
//! thesis analysis → sourcing → picking → DD search → DD analysis.
//!
//! # Architecture
//!
//! - **Search**: the `scout-search` crate fans queries out to search
//!   providers with cost-aware fallback and merges results into ranked
//!   candidates
//! - **Scoring**: the model judges candidates on seven criteria, reduced
//!   to one fit score with configurable weights
//! - **Extraction**: model text is recovered as JSON even when fenced,
//!   padded or truncated
//! - **Jobs**: a persisted state machine with optimistic concurrency,
//!   advanced one step per `continue` message from a durable SQLite queue
//! - **Host**: newline-delimited JSON envelopes over stdin/stdout

pub mod app;
pub mod config;
pub mod diligence;
pub mod error;
pub mod extract;
mod fields;
pub mod host;
pub mod jobs;
pub mod llm;
pub mod scoring;
pub mod scout_dirs;
pub mod thesis;

#[cfg(test)]
pub(crate) mod test_utils;

pub use app::App;
pub use config::ScoutConfig;
pub use error::{Result, ScoutError};
pub use jobs::{ContinueOutcome, Drive, Job, JobSnapshot, Orchestrator, Phase, Step};
