//! LLM provider abstraction.
//!
//! A provider turns a `(system, user)` prompt pair into raw completion
//! text. The text is untrusted: callers always pass it through
//! [`crate::extract::extract_json`] before reading fields.

pub mod fallback;
pub mod openai_compat;

use async_trait::async_trait;

pub use fallback::LlmChain;
pub use openai_compat::OpenAiCompatProvider;

/// Stable error codes for LLM failures.
pub mod error_codes {
    /// Missing or rejected API key.
    pub const AUTH_FAILED: &str = "AUTH_FAILED";

    /// Provider answered 429.
    pub const RATE_LIMITED: &str = "RATE_LIMITED";

    /// Transport-level failure (connect, reset, DNS).
    pub const REQUEST_FAILED: &str = "REQUEST_FAILED";

    /// Request timed out.
    pub const TIMEOUT_ERROR: &str = "TIMEOUT_ERROR";

    /// Provider-side failure (5xx or unusable response body).
    pub const PROVIDER_ERROR: &str = "PROVIDER_ERROR";

    /// Provider rejected the request (4xx other than auth/rate limit).
    pub const BAD_REQUEST: &str = "BAD_REQUEST";

    /// Invalid or missing configuration.
    pub const CONFIG_INVALID: &str = "CONFIG_INVALID";
}

/// Errors produced by LLM providers.
///
/// The Display impl formats as `[CODE] message`.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LlmError {
    #[error("[{}] {}", error_codes::AUTH_FAILED, .0)]
    Auth(String),

    #[error("[{}] {}", error_codes::RATE_LIMITED, .0)]
    RateLimited(String),

    #[error("[{}] {}", error_codes::REQUEST_FAILED, .0)]
    Request(String),

    #[error("[{}] {}", error_codes::TIMEOUT_ERROR, .0)]
    Timeout(String),

    #[error("[{}] {}", error_codes::PROVIDER_ERROR, .0)]
    Provider(String),

    #[error("[{}] {}", error_codes::BAD_REQUEST, .0)]
    BadRequest(String),

    #[error("[{}] {}", error_codes::CONFIG_INVALID, .0)]
    Config(String),
}

impl LlmError {
    /// Returns the stable error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Auth(_) => error_codes::AUTH_FAILED,
            Self::RateLimited(_) => error_codes::RATE_LIMITED,
            Self::Request(_) => error_codes::REQUEST_FAILED,
            Self::Timeout(_) => error_codes::TIMEOUT_ERROR,
            Self::Provider(_) => error_codes::PROVIDER_ERROR,
            Self::BadRequest(_) => error_codes::BAD_REQUEST,
            Self::Config(_) => error_codes::CONFIG_INVALID,
        }
    }

    /// Transient errors are retried on the same provider; the rest move
    /// straight to the next provider in the chain.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited(_) | Self::Request(_) | Self::Timeout(_) | Self::Provider(_)
        )
    }
}

/// Per-request sampling options.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionOptions {
    pub temperature: f64,
    pub max_tokens: u32,
    /// Ask the provider for a JSON object response when it supports it.
    pub json_mode: bool,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            temperature: 0.2,
            max_tokens: 2_048,
            json_mode: true,
        }
    }
}

/// A text completion backend.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// False when the provider lacks credentials and must be skipped.
    fn is_configured(&self) -> bool {
        true
    }

    /// Complete one prompt pair, returning the raw model text.
    async fn complete(
        &self,
        system: &str,
        user: &str,
        options: &CompletionOptions,
    ) -> Result<String, LlmError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_errors_are_retryable() {
        assert!(LlmError::RateLimited("429".into()).is_retryable());
        assert!(LlmError::Timeout("slow".into()).is_retryable());
        assert!(LlmError::Provider("502".into()).is_retryable());
        assert!(!LlmError::Auth("401".into()).is_retryable());
        assert!(!LlmError::BadRequest("400".into()).is_retryable());
        assert!(!LlmError::Config("no key".into()).is_retryable());
    }

    #[test]
    fn display_carries_code() {
        let err = LlmError::Auth("invalid key".into());
        assert_eq!(err.to_string(), "[AUTH_FAILED] invalid key");
        assert_eq!(err.code(), "AUTH_FAILED");
    }
}
