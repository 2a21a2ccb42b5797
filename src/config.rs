//! Configuration types for the sourcing pipeline.
//!
//! Loaded from TOML. Every section uses `#[serde(default)]`, so a partial
//! file (or no file at all) yields a working configuration. API keys are
//! never stored here; the config only names the environment variables
//! that hold them.

use std::path::{Path, PathBuf};

use scout_search::SearchConfig;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ScoutError};
use crate::scoring::ScoringWeights;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoutConfig {
    /// Search aggregation (provider order, retries, cache, breaker).
    pub search: SearchConfig,
    /// LLM provider chain.
    pub llm: LlmConfig,
    /// Scoring weights.
    pub scoring: ScoringConfig,
    /// Job state machine tuning.
    pub pipeline: PipelineConfig,
    /// Job store and queue worker.
    pub store: StoreConfig,
}

/// One OpenAI-compatible chat completions endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmProviderConfig {
    /// Name used in logs.
    pub name: String,
    /// API root, e.g. `https://api.openai.com/v1`.
    pub base_url: String,
    /// Model identifier sent with every request.
    pub model: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
}

/// LLM chain configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Providers in fallback order; the first is preferred.
    pub providers: Vec<LlmProviderConfig>,
    /// Sampling temperature.
    pub temperature: f64,
    /// Maximum tokens per completion.
    pub max_tokens: u32,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            providers: vec![LlmProviderConfig {
                name: "openai".to_owned(),
                base_url: "https://api.openai.com/v1".to_owned(),
                model: "gpt-4o-mini".to_owned(),
                api_key_env: "OPENAI_API_KEY".to_owned(),
            }],
            temperature: 0.2,
            max_tokens: 2_048,
            timeout_secs: 60,
        }
    }
}

/// Scoring configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub weights: ScoringWeights,
}

/// Job state machine tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Consecutive failures of one step before the job goes to `error`.
    pub max_retries: u32,
    /// Upper bound for the retrigger delay (`min(2^n, cap)` seconds).
    pub backoff_cap_secs: u64,
    /// Wall-clock budget for a single phase execution.
    pub phase_budget_secs: u64,
    /// Concurrent sub-calls per batch.
    pub batch_size: usize,
    /// Pause between batches.
    pub batch_delay_ms: u64,
    /// Results requested per sourcing query.
    pub results_per_query: usize,
    /// Upper bound on sourcing queries taken from the thesis summary.
    pub max_queries: usize,
    /// How many top-ranked candidates are scored during picking.
    pub pick_pool_size: usize,
    /// Ranked candidates kept in the sourcing checkpoint.
    pub max_candidates: usize,
    /// Results requested per due-diligence query.
    pub dd_results_per_query: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_cap_secs: 60,
            phase_budget_secs: 240,
            batch_size: 4,
            batch_delay_ms: 500,
            results_per_query: 10,
            max_queries: 12,
            pick_pool_size: 5,
            max_candidates: 100,
            dd_results_per_query: 5,
        }
    }
}

/// Job store and queue worker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite database file.
    pub db_path: PathBuf,
    /// Seconds a claimed queue message stays invisible to other workers.
    pub queue_lease_secs: u64,
    /// Idle poll interval of the queue worker.
    pub worker_poll_ms: u64,
    /// Messages claimed per poll.
    pub worker_claim_limit: usize,
    /// Deliveries after which a message is dropped as poison.
    pub max_deliveries: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: crate::scout_dirs::jobs_db_file(),
            queue_lease_secs: 300,
            worker_poll_ms: 1_000,
            worker_claim_limit: 4,
            max_deliveries: 20,
        }
    }
}

impl ScoutConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| ScoutError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| ScoutError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path (see [`crate::scout_dirs::config_file`]).
    pub fn default_config_path() -> PathBuf {
        crate::scout_dirs::config_file()
    }

    /// Load from the default path, or defaults when no file exists.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file is unreadable or invalid.
    pub fn load() -> Result<Self> {
        let path = Self::default_config_path();
        let config = if path.exists() {
            tracing::info!(path = %path.display(), "loading config");
            Self::from_file(&path)?
        } else {
            tracing::info!(path = %path.display(), "no config file, using defaults");
            Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate every section.
    ///
    /// # Errors
    ///
    /// Returns [`ScoutError::Config`] naming the first invalid field.
    pub fn validate(&self) -> Result<()> {
        self.search.validate()?;
        self.scoring.weights.validate()?;

        if self.llm.providers.is_empty() {
            return Err(ScoutError::Config("llm.providers must not be empty".into()));
        }
        for provider in &self.llm.providers {
            if provider.base_url.trim().is_empty() || provider.model.trim().is_empty() {
                return Err(ScoutError::Config(format!(
                    "llm provider '{}' needs base_url and model",
                    provider.name
                )));
            }
        }
        if self.llm.timeout_secs == 0 {
            return Err(ScoutError::Config("llm.timeout_secs must be > 0".into()));
        }

        let p = &self.pipeline;
        if p.max_retries == 0 {
            return Err(ScoutError::Config("pipeline.max_retries must be > 0".into()));
        }
        if p.batch_size == 0 {
            return Err(ScoutError::Config("pipeline.batch_size must be > 0".into()));
        }
        if p.phase_budget_secs == 0 {
            return Err(ScoutError::Config(
                "pipeline.phase_budget_secs must be > 0".into(),
            ));
        }
        if p.results_per_query == 0 || p.dd_results_per_query == 0 {
            return Err(ScoutError::Config(
                "pipeline result counts must be > 0".into(),
            ));
        }
        if p.pick_pool_size == 0 || p.max_queries == 0 || p.max_candidates == 0 {
            return Err(ScoutError::Config(
                "pipeline.pick_pool_size, max_queries and max_candidates must be > 0".into(),
            ));
        }

        if self.store.queue_lease_secs == 0 || self.store.worker_claim_limit == 0 {
            return Err(ScoutError::Config(
                "store.queue_lease_secs and worker_claim_limit must be > 0".into(),
            ));
        }
        // A lease shorter than a phase would redeliver work still in flight.
        if self.store.queue_lease_secs <= p.phase_budget_secs {
            return Err(ScoutError::Config(
                "store.queue_lease_secs must exceed pipeline.phase_budget_secs".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use scout_search::ProviderId;

    #[test]
    fn default_config_is_valid() {
        let config = ScoutConfig::default();
        config.validate().unwrap();
        assert_eq!(config.pipeline.max_retries, 3);
        assert_eq!(config.search.providers, vec![ProviderId::Brave, ProviderId::Serper]);
    }

    #[test]
    fn lease_must_outlast_phase_budget() {
        let mut config = ScoutConfig::default();
        config.store.queue_lease_secs = config.pipeline.phase_budget_secs;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("queue_lease_secs"));
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = ScoutConfig::default();
        config.pipeline.batch_size = 7;
        config.search.providers = vec![ProviderId::Serper];
        config.llm.temperature = 0.7;

        config.save_to_file(&path).unwrap();
        let loaded = ScoutConfig::from_file(&path).unwrap();
        assert_eq!(loaded.pipeline.batch_size, 7);
        assert_eq!(loaded.search.providers, vec![ProviderId::Serper]);
        assert!((loaded.llm.temperature - 0.7).abs() < f64::EPSILON);
    }

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[pipeline]\nmax_retries = 5\n").unwrap();

        let loaded = ScoutConfig::from_file(&path).unwrap();
        assert_eq!(loaded.pipeline.max_retries, 5);
        assert_eq!(loaded.pipeline.batch_size, 4);
        assert_eq!(loaded.llm.providers.len(), 1);
    }

    #[test]
    fn from_file_invalid_toml_returns_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "this is not valid toml {{{").unwrap();

        let err = ScoutConfig::from_file(&path).unwrap_err();
        assert_eq!(err.code(), "CONFIG_INVALID");
    }

    #[test]
    fn from_file_missing_returns_io_error() {
        let err = ScoutConfig::from_file(Path::new("/nonexistent/thesis-scout.toml")).unwrap_err();
        assert_eq!(err.code(), "IO_ERROR");
    }

    #[test]
    fn validate_rejects_zero_retries() {
        let mut config = ScoutConfig::default();
        config.pipeline.max_retries = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_weights() {
        let mut config = ScoutConfig::default();
        config.scoring.weights.thesis_fit = 0.9;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_empty_llm_chain() {
        let mut config = ScoutConfig::default();
        config.llm.providers.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn weights_are_read_from_toml() {
        let toml = r#"
[scoring.weights]
thesis_fit = 0.40
signal_diversity = 0.10
source_corroboration = 0.10
french_ecosystem_bias = 0.10
timing = 0.10
team_quality = 0.12
competitive_position = 0.08
"#;
        let config: ScoutConfig = toml::from_str(toml).unwrap();
        assert!((config.scoring.weights.thesis_fit - 0.40).abs() < 1e-9);
        config.validate().unwrap();
    }
}
