//! Network-resilience fallback chain for LLM providers.
//!
//! [`LlmChain`] holds an ordered list of providers and implements
//! [`LlmProvider`] itself, so the pipeline never sees individual backends.
//!
//! # Retry policy
//!
//! - **Transient errors** (timeout, 429, 5xx, connection refused): retry up
//!   to [`RETRY_ATTEMPTS`] times with exponential delay starting at
//!   [`RETRY_BACKOFF_MS`], then move to the next provider.
//! - **Permanent errors** (auth failure, other 4xx, config): skip to the
//!   next provider immediately without retrying.
//! - Unconfigured providers (no API key) are skipped.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::{CompletionOptions, LlmError, LlmProvider, OpenAiCompatProvider};
use crate::config::LlmConfig;

/// Attempts per provider for a transient error before trying the next one.
pub const RETRY_ATTEMPTS: u32 = 3;

/// Base delay in milliseconds between transient-error retries.
pub const RETRY_BACKOFF_MS: u64 = 500;

/// Ordered fallback chain over LLM providers.
pub struct LlmChain {
    providers: Vec<Arc<dyn LlmProvider>>,
    backoff: Duration,
}

impl LlmChain {
    /// Create a chain; the first provider is tried first.
    pub fn new(providers: Vec<Arc<dyn LlmProvider>>) -> Self {
        Self {
            providers,
            backoff: Duration::from_millis(RETRY_BACKOFF_MS),
        }
    }

    /// Override the base retry delay (tests use a few milliseconds).
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Build one OpenAI-compatible provider per configured endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::Config`] if the HTTP client cannot be built.
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::Config(format!("failed to build HTTP client: {e}")))?;
        let providers = config
            .providers
            .iter()
            .map(|p| {
                Arc::new(OpenAiCompatProvider::from_config(client.clone(), p))
                    as Arc<dyn LlmProvider>
            })
            .collect();
        Ok(Self::new(providers))
    }

    /// Return the number of providers in the chain.
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Return `true` if the chain has no providers.
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

#[async_trait]
impl LlmProvider for LlmChain {
    fn name(&self) -> &str {
        "chain"
    }

    fn is_configured(&self) -> bool {
        self.providers.iter().any(|p| p.is_configured())
    }

    async fn complete(
        &self,
        system: &str,
        user: &str,
        options: &CompletionOptions,
    ) -> Result<String, LlmError> {
        let mut last_error: Option<LlmError> = None;

        for provider in &self.providers {
            let name = provider.name();
            if !provider.is_configured() {
                debug!(provider = name, "skipping unconfigured LLM provider");
                continue;
            }

            for attempt in 1..=RETRY_ATTEMPTS {
                match provider.complete(system, user, options).await {
                    Ok(text) => {
                        info!(provider = name, attempt, "LLM request succeeded");
                        return Ok(text);
                    }
                    Err(e) if e.is_retryable() && attempt < RETRY_ATTEMPTS => {
                        warn!(
                            provider = name,
                            attempt,
                            max = RETRY_ATTEMPTS,
                            error = %e,
                            "LLM transient failure"
                        );
                        tokio::time::sleep(self.backoff * 2u32.pow(attempt - 1)).await;
                        last_error = Some(e);
                    }
                    Err(e) => {
                        warn!(provider = name, error = %e, "LLM provider exhausted, trying next");
                        last_error = Some(e);
                        break;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            LlmError::Config("no configured LLM provider (set the API key env var)".into())
        }))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Scripted {
        name: &'static str,
        configured: bool,
        replies: Mutex<VecDeque<Result<String, LlmError>>>,
        calls: AtomicU32,
    }

    impl Scripted {
        fn new(name: &'static str, replies: Vec<Result<String, LlmError>>) -> Arc<Self> {
            Arc::new(Self {
                name,
                configured: true,
                replies: Mutex::new(replies.into()),
                calls: AtomicU32::new(0),
            })
        }

        fn unconfigured(name: &'static str) -> Arc<Self> {
            Arc::new(Self {
                name,
                configured: false,
                replies: Mutex::new(VecDeque::new()),
                calls: AtomicU32::new(0),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LlmProvider for Scripted {
        fn name(&self) -> &str {
            self.name
        }

        fn is_configured(&self) -> bool {
            self.configured
        }

        async fn complete(
            &self,
            _system: &str,
            _user: &str,
            _options: &CompletionOptions,
        ) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(LlmError::Provider("script exhausted".into())))
        }
    }

    fn chain(providers: Vec<Arc<dyn LlmProvider>>) -> LlmChain {
        LlmChain::new(providers).with_backoff(Duration::from_millis(1))
    }

    fn dynp(p: &Arc<Scripted>) -> Arc<dyn LlmProvider> {
        p.clone()
    }

    #[tokio::test]
    async fn first_provider_success_short_circuits() {
        let a = Scripted::new("a", vec![Ok("hello".into())]);
        let b = Scripted::new("b", vec![Ok("unused".into())]);
        let chain = chain(vec![dynp(&a), dynp(&b)]);

        let text = chain.complete("s", "u", &CompletionOptions::default()).await.unwrap();
        assert_eq!(text, "hello");
        assert_eq!(b.calls(), 0);
    }

    #[tokio::test]
    async fn transient_failures_retry_then_fall_through() {
        let a = Scripted::new(
            "a",
            vec![
                Err(LlmError::Timeout("t".into())),
                Err(LlmError::RateLimited("r".into())),
                Err(LlmError::Provider("p".into())),
            ],
        );
        let b = Scripted::new("b", vec![Ok("from b".into())]);
        let chain = chain(vec![dynp(&a), dynp(&b)]);

        let text = chain.complete("s", "u", &CompletionOptions::default()).await.unwrap();
        assert_eq!(text, "from b");
        assert_eq!(a.calls(), RETRY_ATTEMPTS);
    }

    #[tokio::test]
    async fn transient_then_success_stays_on_provider() {
        let a = Scripted::new("a", vec![Err(LlmError::Timeout("t".into())), Ok("ok".into())]);
        let chain = chain(vec![dynp(&a)]);

        let text = chain.complete("s", "u", &CompletionOptions::default()).await.unwrap();
        assert_eq!(text, "ok");
        assert_eq!(a.calls(), 2);
    }

    #[tokio::test]
    async fn permanent_failure_skips_immediately() {
        let a = Scripted::new("a", vec![Err(LlmError::Auth("401".into()))]);
        let b = Scripted::new("b", vec![Ok("b".into())]);
        let chain = chain(vec![dynp(&a), dynp(&b)]);

        chain.complete("s", "u", &CompletionOptions::default()).await.unwrap();
        assert_eq!(a.calls(), 1);
    }

    #[tokio::test]
    async fn unconfigured_providers_are_skipped() {
        let a = Scripted::unconfigured("a");
        let b = Scripted::new("b", vec![Ok("b".into())]);
        let chain = chain(vec![dynp(&a), dynp(&b)]);

        assert!(chain.is_configured());
        chain.complete("s", "u", &CompletionOptions::default()).await.unwrap();
        assert_eq!(a.calls(), 0);
    }

    #[tokio::test]
    async fn all_exhausted_returns_last_error() {
        let a = Scripted::new("a", vec![Err(LlmError::BadRequest("400".into()))]);
        let chain = chain(vec![dynp(&a)]);

        let err = chain.complete("s", "u", &CompletionOptions::default()).await.unwrap_err();
        assert!(matches!(err, LlmError::BadRequest(_)));
    }

    #[tokio::test]
    async fn empty_chain_is_config_error() {
        let chain = chain(vec![]);
        assert!(chain.is_empty());
        let err = chain.complete("s", "u", &CompletionOptions::default()).await.unwrap_err();
        assert!(matches!(err, LlmError::Config(_)));
    }
}
