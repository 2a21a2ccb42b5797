//! In-process store and queue, for tests and ephemeral runs.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::store::{ClaimedMessage, ContinueQueue, JobStore, lease_deadline};
use super::types::{Job, Phase};
use crate::error::{Result, ScoutError};

#[derive(Debug, Clone)]
struct Message {
    id: i64,
    job_id: String,
    visible_at: DateTime<Utc>,
    attempts: u32,
}

#[derive(Default)]
struct QueueState {
    next_id: i64,
    messages: Vec<Message>,
}

/// `HashMap`-backed [`JobStore`] and [`ContinueQueue`].
#[derive(Default)]
pub struct InMemoryJobStore {
    jobs: Mutex<HashMap<String, Job>>,
    queue: Mutex<QueueState>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn jobs(&self) -> Result<MutexGuard<'_, HashMap<String, Job>>> {
        self.jobs
            .lock()
            .map_err(|e| ScoutError::Store(format!("job map lock poisoned: {e}")))
    }

    fn queue(&self) -> Result<MutexGuard<'_, QueueState>> {
        self.queue
            .lock()
            .map_err(|e| ScoutError::Store(format!("queue lock poisoned: {e}")))
    }
}

impl JobStore for InMemoryJobStore {
    fn create(&self, job: &Job) -> Result<Job> {
        let mut jobs = self.jobs()?;
        if jobs.contains_key(&job.id) {
            return Err(ScoutError::Store(format!("job {} already exists", job.id)));
        }
        let mut stored = job.clone();
        stored.version = 1;
        jobs.insert(stored.id.clone(), stored.clone());
        Ok(stored)
    }

    fn get(&self, id: &str) -> Result<Job> {
        self.jobs()?
            .get(id)
            .cloned()
            .ok_or_else(|| ScoutError::JobNotFound(id.to_owned()))
    }

    fn save(&self, job: &Job) -> Result<Job> {
        let mut jobs = self.jobs()?;
        let current = jobs
            .get_mut(&job.id)
            .ok_or_else(|| ScoutError::JobNotFound(job.id.clone()))?;
        if current.version != job.version {
            return Err(ScoutError::VersionConflict {
                job_id: job.id.clone(),
                expected: job.version,
            });
        }
        let mut stored = job.clone();
        stored.version = job.version + 1;
        stored.updated_at = Utc::now();
        *current = stored.clone();
        Ok(stored)
    }

    fn force_error(&self, id: &str, reason: &str) -> Result<Job> {
        let mut jobs = self.jobs()?;
        let current = jobs
            .get_mut(id)
            .ok_or_else(|| ScoutError::JobNotFound(id.to_owned()))?;
        if current.phase.is_terminal() {
            return Err(ScoutError::PhaseContractViolation {
                job_id: id.to_owned(),
                phase: current.phase.to_string(),
                operation: "force_error".into(),
            });
        }
        current.error_step = current.phase.step().map(|s| s.as_str().to_owned());
        current.set_phase(Phase::Error);
        current.error_message = Some(reason.to_owned());
        current.next_attempt_at = None;
        current.version += 1;
        current.updated_at = Utc::now();
        Ok(current.clone())
    }
}

impl ContinueQueue for InMemoryJobStore {
    fn enqueue_continue(&self, job_id: &str, visible_at: DateTime<Utc>) -> Result<()> {
        let mut queue = self.queue()?;
        if let Some(existing) = queue
            .messages
            .iter_mut()
            .find(|m| m.job_id == job_id && m.attempts == 0)
        {
            existing.visible_at = existing.visible_at.min(visible_at);
            return Ok(());
        }
        queue.next_id += 1;
        let id = queue.next_id;
        queue.messages.push(Message {
            id,
            job_id: job_id.to_owned(),
            visible_at,
            attempts: 0,
        });
        Ok(())
    }

    fn claim_due(
        &self,
        now: DateTime<Utc>,
        limit: usize,
        lease: Duration,
    ) -> Result<Vec<ClaimedMessage>> {
        let mut queue = self.queue()?;
        let deadline = lease_deadline(now, lease);

        let mut due: Vec<&mut Message> = queue
            .messages
            .iter_mut()
            .filter(|m| m.visible_at <= now)
            .collect();
        due.sort_by_key(|m| (m.visible_at, m.id));

        Ok(due
            .into_iter()
            .take(limit)
            .map(|m| {
                m.visible_at = deadline;
                m.attempts += 1;
                ClaimedMessage {
                    id: m.id,
                    job_id: m.job_id.clone(),
                    attempts: m.attempts,
                }
            })
            .collect())
    }

    fn ack(&self, message_id: i64) -> Result<()> {
        self.queue()?.messages.retain(|m| m.id != message_id);
        Ok(())
    }

    fn pending(&self) -> Result<usize> {
        Ok(self.queue()?.messages.len())
    }
}
