//! Queue worker: claims due `continue` messages and runs them.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::orchestrator::Orchestrator;
use super::store::{ClaimedMessage, ContinueQueue};
use crate::config::StoreConfig;
use crate::error::Result;

pub struct Worker {
    orchestrator: Arc<Orchestrator>,
    queue: Arc<dyn ContinueQueue>,
    config: StoreConfig,
}

impl Worker {
    pub fn new(
        orchestrator: Arc<Orchestrator>,
        queue: Arc<dyn ContinueQueue>,
        config: StoreConfig,
    ) -> Self {
        Self {
            orchestrator,
            queue,
            config,
        }
    }

    /// Claim and process one round of due messages concurrently.
    ///
    /// Returns the number of messages claimed.
    pub async fn tick(&self) -> Result<usize> {
        let claimed = self.queue.claim_due(
            Utc::now(),
            self.config.worker_claim_limit,
            Duration::from_secs(self.config.queue_lease_secs),
        )?;
        let count = claimed.len();
        if count > 0 {
            debug!(count, "claimed continue messages");
        }
        join_all(claimed.into_iter().map(|m| self.process(m))).await;
        Ok(count)
    }

    async fn process(&self, message: ClaimedMessage) {
        if message.attempts > self.config.max_deliveries {
            warn!(
                job_id = %message.job_id,
                attempts = message.attempts,
                "dropping poison continue message"
            );
            self.ack(&message);
            return;
        }

        match self.orchestrator.continue_job(&message.job_id).await {
            Ok(outcome) => {
                debug!(job_id = %message.job_id, outcome = ?outcome, "continue processed");
                self.ack(&message);
            }
            // Left unacked: the lease expires and the message is redelivered.
            Err(e) if e.is_retryable() => {
                warn!(job_id = %message.job_id, error = %e, "continue failed, awaiting redelivery");
            }
            Err(e) => {
                warn!(job_id = %message.job_id, error = %e, "continue rejected, dropping message");
                self.ack(&message);
            }
        }
    }

    fn ack(&self, message: &ClaimedMessage) {
        if let Err(e) = self.queue.ack(message.id) {
            error!(message_id = message.id, error = %e, "failed to ack continue message");
        }
    }

    /// Poll until `cancel` fires. A round that claimed nothing sleeps for
    /// the poll interval; a busy round polls again immediately.
    pub async fn run(&self, cancel: CancellationToken) {
        let poll = Duration::from_millis(self.config.worker_poll_ms);
        info!(poll_ms = self.config.worker_poll_ms, "queue worker started");
        loop {
            let claimed = match self.tick().await {
                Ok(n) => n,
                Err(e) => {
                    error!(error = %e, "queue poll failed");
                    0
                }
            };
            if cancel.is_cancelled() {
                break;
            }
            if claimed == 0 {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(poll) => {}
                }
            }
        }
        info!("queue worker stopped");
    }
}
