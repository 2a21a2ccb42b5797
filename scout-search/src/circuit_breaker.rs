//! Per-provider circuit breaker.
//!
//! Each [`crate::Aggregator`] owns one breaker. A provider that fails
//! `failure_threshold` times in a row is skipped until `cooldown_secs`
//! have elapsed, after which a single probe call decides whether it is
//! restored or tripped again.
//!
//! ```text
//! Closed --N failures--> Open --cooldown--> HalfOpen
//!   ^                     ^                    |
//!   |                     +------failure-------+
//!   +-------------------success----------------+
//! ```

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::types::ProviderId;

/// Breaker state for one provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Calls go through.
    Closed,
    /// Calls are skipped until the cooldown expires.
    Open,
    /// One probe call is allowed.
    HalfOpen,
}

#[derive(Debug, Clone)]
struct ProviderHealth {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
}

impl Default for ProviderHealth {
    fn default() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            opened_at: None,
        }
    }
}

/// Breaker tuning, embedded in [`crate::SearchConfig`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before the circuit opens.
    pub failure_threshold: u32,
    /// Seconds an open circuit waits before allowing a probe.
    pub cooldown_secs: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            cooldown_secs: 60,
        }
    }
}

/// Tracks provider health and decides whether a call should be attempted.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    providers: Mutex<HashMap<ProviderId, ProviderHealth>>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            providers: Mutex::new(HashMap::new()),
        }
    }

    /// Record a successful call; the circuit closes.
    pub fn record_success(&self, provider: ProviderId) {
        self.with_health(provider, |health, _| {
            *health = ProviderHealth::default();
        });
    }

    /// Record a failed call; the circuit opens once the threshold is hit.
    ///
    /// A failed half-open probe reopens the circuit immediately.
    pub fn record_failure(&self, provider: ProviderId) {
        self.with_health(provider, |health, config| {
            health.consecutive_failures = health.consecutive_failures.saturating_add(1);
            let probe_failed = health.state == CircuitState::HalfOpen;
            if probe_failed || health.consecutive_failures >= config.failure_threshold {
                if health.state != CircuitState::Open {
                    tracing::warn!(
                        %provider,
                        failures = health.consecutive_failures,
                        "circuit opened for search provider"
                    );
                }
                health.state = CircuitState::Open;
                health.opened_at = Some(Instant::now());
            }
        });
    }

    /// Whether a call to `provider` should be attempted now.
    ///
    /// An open circuit whose cooldown has elapsed moves to half-open and
    /// admits exactly one probe; further calls are refused until that
    /// probe reports back.
    pub fn should_attempt(&self, provider: ProviderId) -> bool {
        self.with_health(provider, |health, config| match health.state {
            CircuitState::Closed => true,
            CircuitState::HalfOpen => false,
            CircuitState::Open => {
                let cooled = health
                    .opened_at
                    .is_none_or(|t| t.elapsed().as_secs() >= config.cooldown_secs);
                if cooled {
                    health.state = CircuitState::HalfOpen;
                }
                cooled
            }
        })
    }

    /// Current state of `provider` (closed if never seen).
    pub fn state(&self, provider: ProviderId) -> CircuitState {
        self.with_health(provider, |health, _| health.state)
    }

    /// `(provider, state, consecutive_failures)` for every tracked provider,
    /// sorted by provider.
    pub fn health_report(&self) -> Vec<(ProviderId, CircuitState, u32)> {
        let map = match self.providers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut report: Vec<_> = map
            .iter()
            .map(|(id, h)| (*id, h.state, h.consecutive_failures))
            .collect();
        report.sort_by_key(|(id, _, _)| *id);
        report
    }

    fn with_health<R>(
        &self,
        provider: ProviderId,
        f: impl FnOnce(&mut ProviderHealth, &CircuitBreakerConfig) -> R,
    ) -> R {
        // A panic while holding the lock cannot leave the map inconsistent.
        let mut map = match self.providers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(map.entry(provider).or_default(), &self.config)
    }
}
