//! Persistence seams: the job row store and the durable continue-queue.
//!
//! Both are synchronous. Calls are short single-row statements, and the
//! SQLite backend serialises them behind one connection mutex.

use std::time::Duration;

use chrono::{DateTime, Utc};

use super::types::Job;
use crate::error::Result;

/// One row per job, read by id and written with a version check.
pub trait JobStore: Send + Sync {
    /// Insert a new job. The stored row gets version 1.
    fn create(&self, job: &Job) -> Result<Job>;

    /// Read a job.
    ///
    /// Fails with [`crate::ScoutError::JobNotFound`].
    fn get(&self, id: &str) -> Result<Job>;

    /// Compare-and-swap write.
    ///
    /// Succeeds only if the stored version equals `job.version`; the row
    /// is written with `version + 1` and the stored job is returned.
    /// Fails with [`crate::ScoutError::VersionConflict`] otherwise.
    fn save(&self, job: &Job) -> Result<Job>;

    /// Operator stop: move a non-terminal job to `error` unconditionally.
    ///
    /// Fails with [`crate::ScoutError::PhaseContractViolation`] for a job
    /// that is already terminal.
    fn force_error(&self, id: &str, reason: &str) -> Result<Job>;
}

/// A claimed `continue` message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimedMessage {
    pub id: i64,
    pub job_id: String,
    /// Deliveries so far, including this one.
    pub attempts: u32,
}

/// Durable queue of `continue` triggers.
pub trait ContinueQueue: Send + Sync {
    /// Schedule a `continue` for `job_id` no earlier than `visible_at`.
    ///
    /// An unclaimed message for the same job is coalesced: it keeps the
    /// earlier of the two visibility times.
    fn enqueue_continue(&self, job_id: &str, visible_at: DateTime<Utc>) -> Result<()>;

    /// Claim up to `limit` messages visible at `now`, hiding each for
    /// `lease` so a crashed worker's messages reappear.
    fn claim_due(
        &self,
        now: DateTime<Utc>,
        limit: usize,
        lease: Duration,
    ) -> Result<Vec<ClaimedMessage>>;

    /// Delete one message. Unknown ids are ignored.
    fn ack(&self, message_id: i64) -> Result<()>;

    /// Messages not yet acknowledged.
    fn pending(&self) -> Result<usize>;
}

/// `now + lease`, saturating on absurd leases.
pub(crate) fn lease_deadline(now: DateTime<Utc>, lease: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(lease)
        .ok()
        .and_then(|d| now.checked_add_signed(d))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
