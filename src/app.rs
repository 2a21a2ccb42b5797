//! Wiring: builds the store, providers, orchestrator and worker from one
//! [`ScoutConfig`].

use std::sync::Arc;

use scout_search::Aggregator;
use tracing::info;

use crate::config::ScoutConfig;
use crate::error::Result;
use crate::host::HostHandler;
use crate::jobs::{Orchestrator, PhaseContext, SqliteJobStore, Worker};
use crate::llm::{CompletionOptions, LlmChain};

/// Everything a binary needs, built once at startup.
pub struct App {
    pub config: ScoutConfig,
    pub store: Arc<SqliteJobStore>,
    pub orchestrator: Arc<Orchestrator>,
}

impl App {
    /// Validate `config`, open the job database and build the provider
    /// chains.
    ///
    /// # Errors
    ///
    /// Invalid config, an unopenable database, or an HTTP client that
    /// cannot be built.
    pub fn from_config(config: ScoutConfig) -> Result<Self> {
        config.validate()?;

        let store = Arc::new(SqliteJobStore::open(&config.store.db_path)?);
        let aggregator = Aggregator::from_config(config.search.clone())?;
        let llm = LlmChain::from_config(&config.llm)?;
        info!(
            db = %config.store.db_path.display(),
            search_providers = ?aggregator.provider_ids(),
            llm_providers = llm.len(),
            "thesis-scout initialised"
        );

        let ctx = PhaseContext {
            aggregator: Arc::new(aggregator),
            llm: Arc::new(llm),
            pipeline: config.pipeline.clone(),
            weights: config.scoring.weights.clone(),
            completion: CompletionOptions {
                temperature: config.llm.temperature,
                max_tokens: config.llm.max_tokens,
                json_mode: true,
            },
        };
        let orchestrator = Arc::new(Orchestrator::new(store.clone(), store.clone(), ctx));

        Ok(Self {
            config,
            store,
            orchestrator,
        })
    }

    /// Load the config from its default location and build.
    ///
    /// # Errors
    ///
    /// See [`ScoutConfig::load`] and [`App::from_config`].
    pub fn load() -> Result<Self> {
        Self::from_config(ScoutConfig::load()?)
    }

    pub fn worker(&self) -> Worker {
        Worker::new(
            Arc::clone(&self.orchestrator),
            self.store.clone(),
            self.config.store.clone(),
        )
    }

    pub fn host_handler(&self) -> Arc<HostHandler> {
        Arc::new(HostHandler::new(Arc::clone(&self.orchestrator)))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::jobs::{Drive, JobStore, Phase};
    use crate::thesis::ThesisInputs;

    #[tokio::test]
    async fn builds_from_default_config_in_temp_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ScoutConfig::default();
        config.store.db_path = dir.path().join("data").join("jobs.db");

        let app = App::from_config(config).unwrap();
        let id = app
            .orchestrator
            .start(
                ThesisInputs {
                    sectors: vec!["climate".into()],
                    ..Default::default()
                },
                Drive::Client,
            )
            .unwrap();
        assert_eq!(app.store.get(&id).unwrap().phase, Phase::Pending);
        assert!(dir.path().join("data").join("jobs.db").exists());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = ScoutConfig::default();
        config.pipeline.batch_size = 0;
        assert!(App::from_config(config).is_err());
    }
}
