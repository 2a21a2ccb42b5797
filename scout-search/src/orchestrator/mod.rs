//! Search aggregation and candidate ranking.
//!
//! [`search`] runs the cost-aware provider fallback chain and dedups
//! results by normalised URL. [`candidates`] merges categorised results
//! into one record per organisation and ranks them with [`scoring`].

pub mod candidates;
pub mod dedup;
pub mod scoring;
pub mod search;
pub mod url_normalize;
