//! Search provider implementations.
//!
//! Each module provides a struct implementing
//! [`crate::provider::SearchProvider`] against a provider's JSON API.

pub mod brave;
pub mod serper;

pub use brave::BraveProvider;
pub use serper::SerperProvider;
