//! Error types for thesis-scout.
//!
//! Each variant carries a stable error code (SCREAMING_SNAKE_CASE) that is
//! included in the Display output and accessible via [`ScoutError::code()`].
//! Codes cross the JSON boundary, so they never change.

use crate::llm::LlmError;
use scout_search::SearchError;

/// Stable error codes for programmatic error handling.
pub mod error_codes {
    /// A provider has no credential or cannot be reached.
    pub const PROVIDER_UNAVAILABLE: &str = "PROVIDER_UNAVAILABLE";

    /// A provider answered 429 or 503.
    pub const RATE_LIMITED: &str = "RATE_LIMITED";

    /// LLM output could not be recovered as JSON.
    pub const MALFORMED_MODEL_OUTPUT: &str = "MALFORMED_MODEL_OUTPUT";

    /// An operation was invoked against a job in the wrong phase.
    pub const PHASE_CONTRACT_VIOLATION: &str = "PHASE_CONTRACT_VIOLATION";

    /// A phase failed `max_retries` times in a row.
    pub const EXHAUSTED_RETRIES: &str = "EXHAUSTED_RETRIES";

    /// A racing writer updated the job first.
    pub const VERSION_CONFLICT: &str = "VERSION_CONFLICT";

    /// No job exists with the given id.
    pub const JOB_NOT_FOUND: &str = "JOB_NOT_FOUND";

    /// Persistent store failure.
    pub const STORE_ERROR: &str = "STORE_ERROR";

    /// LLM provider chain failure.
    pub const LLM_ERROR: &str = "LLM_ERROR";

    /// Search aggregation failure.
    pub const SEARCH_ERROR: &str = "SEARCH_ERROR";

    /// Invalid or missing configuration.
    pub const CONFIG_INVALID: &str = "CONFIG_INVALID";

    /// Caller supplied an invalid payload.
    pub const INVALID_INPUT: &str = "INVALID_INPUT";

    /// Filesystem or stream I/O failure.
    pub const IO_ERROR: &str = "IO_ERROR";

    /// A phase or external call exceeded its time budget.
    pub const TIMEOUT_ERROR: &str = "TIMEOUT_ERROR";
}

/// Errors produced by thesis-scout.
///
/// The Display impl formats as `[CODE] message`.
#[derive(Debug, thiserror::Error)]
pub enum ScoutError {
    #[error("[{}] {}", error_codes::PROVIDER_UNAVAILABLE, .0)]
    ProviderUnavailable(String),

    #[error("[{}] {}", error_codes::RATE_LIMITED, .0)]
    RateLimited(String),

    /// Every extraction attempt failed. Only the input length is kept;
    /// model text may be large and is never echoed back.
    #[error(
        "[{code}] model output is not recoverable JSON ({input_len} bytes)",
        code = error_codes::MALFORMED_MODEL_OUTPUT
    )]
    MalformedModelOutput { input_len: usize },

    #[error(
        "[{code}] {operation} cannot run on job {job_id} in phase {phase}",
        code = error_codes::PHASE_CONTRACT_VIOLATION
    )]
    PhaseContractViolation {
        job_id: String,
        phase: String,
        operation: String,
    },

    #[error(
        "[{code}] step {step} failed {attempts} times: {message}",
        code = error_codes::EXHAUSTED_RETRIES
    )]
    ExhaustedRetries {
        step: String,
        attempts: u32,
        message: String,
    },

    #[error(
        "[{code}] job {job_id} changed since version {expected}",
        code = error_codes::VERSION_CONFLICT
    )]
    VersionConflict { job_id: String, expected: u64 },

    #[error("[{}] {}", error_codes::JOB_NOT_FOUND, .0)]
    JobNotFound(String),

    #[error("[{}] {}", error_codes::STORE_ERROR, .0)]
    Store(String),

    #[error("[{}] {}", error_codes::LLM_ERROR, .0)]
    Llm(String),

    #[error("[{}] {}", error_codes::SEARCH_ERROR, .0)]
    Search(String),

    #[error("[{}] {}", error_codes::CONFIG_INVALID, .0)]
    Config(String),

    #[error("[{}] {}", error_codes::INVALID_INPUT, .0)]
    InvalidInput(String),

    #[error("[{}] {}", error_codes::IO_ERROR, .0)]
    Io(String),

    #[error("[{}] {}", error_codes::TIMEOUT_ERROR, .0)]
    Timeout(String),
}

impl ScoutError {
    /// Returns the stable error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ProviderUnavailable(_) => error_codes::PROVIDER_UNAVAILABLE,
            Self::RateLimited(_) => error_codes::RATE_LIMITED,
            Self::MalformedModelOutput { .. } => error_codes::MALFORMED_MODEL_OUTPUT,
            Self::PhaseContractViolation { .. } => error_codes::PHASE_CONTRACT_VIOLATION,
            Self::ExhaustedRetries { .. } => error_codes::EXHAUSTED_RETRIES,
            Self::VersionConflict { .. } => error_codes::VERSION_CONFLICT,
            Self::JobNotFound(_) => error_codes::JOB_NOT_FOUND,
            Self::Store(_) => error_codes::STORE_ERROR,
            Self::Llm(_) => error_codes::LLM_ERROR,
            Self::Search(_) => error_codes::SEARCH_ERROR,
            Self::Config(_) => error_codes::CONFIG_INVALID,
            Self::InvalidInput(_) => error_codes::INVALID_INPUT,
            Self::Io(_) => error_codes::IO_ERROR,
            Self::Timeout(_) => error_codes::TIMEOUT_ERROR,
        }
    }

    /// Returns true when re-running the failed phase may succeed.
    ///
    /// Stale preconditions (wrong phase, lost version race, unknown job)
    /// and configuration problems cannot be fixed by a retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::PhaseContractViolation { .. }
            | Self::ExhaustedRetries { .. }
            | Self::VersionConflict { .. }
            | Self::JobNotFound(_)
            | Self::Config(_)
            | Self::InvalidInput(_) => false,
            Self::ProviderUnavailable(_)
            | Self::RateLimited(_)
            | Self::MalformedModelOutput { .. }
            | Self::Store(_)
            | Self::Llm(_)
            | Self::Search(_)
            | Self::Io(_)
            | Self::Timeout(_) => true,
        }
    }
}

impl From<rusqlite::Error> for ScoutError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Store(e.to_string())
    }
}

impl From<std::io::Error> for ScoutError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<serde_json::Error> for ScoutError {
    fn from(e: serde_json::Error) -> Self {
        Self::Store(format!("serialization failed: {e}"))
    }
}

impl From<LlmError> for ScoutError {
    fn from(e: LlmError) -> Self {
        match e {
            LlmError::RateLimited(m) => Self::RateLimited(m),
            LlmError::Timeout(m) => Self::Timeout(m),
            LlmError::Config(m) => Self::Config(m),
            other => Self::Llm(other.to_string()),
        }
    }
}

impl From<SearchError> for ScoutError {
    fn from(e: SearchError) -> Self {
        match e {
            SearchError::ProviderUnavailable(m) => Self::ProviderUnavailable(m),
            SearchError::RateLimited(m) => Self::RateLimited(m),
            SearchError::Timeout(m) => Self::Timeout(m),
            SearchError::Config(m) => Self::Config(m),
            other => Self::Search(other.to_string()),
        }
    }
}

/// Convenience alias for thesis-scout results.
pub type Result<T> = std::result::Result<T, ScoutError>;
