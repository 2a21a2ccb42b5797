//! Job state machine.
//!
//! Every step runs as claim → handler → result write:
//!
//! 1. **Claim**: write the running phase under the version check. Losing
//!    the race means another invocation owns this step; return without
//!    side effects.
//! 2. **Handler**: run the step against the claimed row, bounded by the
//!    phase budget.
//! 3. **Result**: on success persist the next resting phase and its
//!    payload, reset `retry_count`, and trigger the next step. On failure
//!    bump `retry_count` and either schedule a retrigger or go to `error`.
//!
//! Handlers may run more than once for the same step (a crashed worker's
//! message is redelivered); the version check keeps only one result.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::phases::{PhaseContext, run_step};
use super::store::{ContinueQueue, JobStore};
use super::types::{Drive, Job, JobSnapshot, Phase, Step};
use crate::error::{Result, ScoutError};
use crate::thesis::ThesisInputs;

/// Result of running (or declining to run) one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ContinueOutcome {
    Advanced {
        from: Phase,
        to: Phase,
    },
    /// The step failed and will be retried; the job stays in `phase`.
    Retrying {
        phase: Phase,
        retry_count: u32,
        retry_in_secs: u64,
        error: String,
    },
    /// The step failed for good; the job is now in `error`.
    Failed {
        step: Step,
        error: String,
    },
    AlreadyTerminal {
        phase: Phase,
    },
    /// Another invocation wrote the job first.
    Superseded,
}

/// Drives jobs through their phases.
pub struct Orchestrator {
    store: Arc<dyn JobStore>,
    queue: Arc<dyn ContinueQueue>,
    ctx: PhaseContext,
}

impl Orchestrator {
    pub fn new(store: Arc<dyn JobStore>, queue: Arc<dyn ContinueQueue>, ctx: PhaseContext) -> Self {
        Self { store, queue, ctx }
    }

    pub fn context(&self) -> &PhaseContext {
        &self.ctx
    }

    /// Create a `pending` job. The drive is stored on the job and governs
    /// every later step; a queue-driven job gets its first `continue`
    /// enqueued immediately.
    ///
    /// # Errors
    ///
    /// [`ScoutError::InvalidInput`] for inputs without a sector.
    pub fn start(&self, inputs: ThesisInputs, drive: Drive) -> Result<String> {
        inputs.validate()?;
        let job = self.store.create(&Job::new(inputs).with_drive(drive))?;
        if drive == Drive::Queue {
            self.queue.enqueue_continue(&job.id, Utc::now())?;
        }
        info!(job_id = %job.id, drive = ?drive, "job started");
        Ok(job.id)
    }

    pub fn status(&self, job_id: &str) -> Result<JobSnapshot> {
        Ok(self.store.get(job_id)?.snapshot())
    }

    /// Advance or retry exactly one step. Follow-ups are enqueued only for
    /// queue-driven jobs.
    pub async fn continue_job(&self, job_id: &str) -> Result<ContinueOutcome> {
        let job = self.store.get(job_id)?;
        match job.phase.step() {
            Some(step) => self.execute(job, step).await,
            None => Ok(ContinueOutcome::AlreadyTerminal { phase: job.phase }),
        }
    }

    /// Client-driven step 2. A job still in the thesis step runs it first.
    pub async fn source(&self, job_id: &str) -> Result<ContinueOutcome> {
        let job = self.checked(
            job_id,
            "source",
            &[
                Phase::Pending,
                Phase::ThesisAnalyzing,
                Phase::ThesisDone,
                Phase::SourcingRunning,
            ],
        )?;
        let job = if job.phase.step() == Some(Step::Thesis) {
            match self.client_step(job, Step::Thesis).await? {
                ContinueOutcome::Advanced { .. } => self.store.get(job_id)?,
                other => return Ok(other),
            }
        } else {
            job
        };
        self.client_step(job, Step::Sourcing).await
    }

    /// Client-driven step 3.
    pub async fn pick(&self, job_id: &str) -> Result<ContinueOutcome> {
        let job = self.checked(job_id, "pick", &[Phase::SourcingDone, Phase::Picking])?;
        self.client_step(job, Step::Picking).await
    }

    /// Client-driven step 4.
    pub async fn dd_search(&self, job_id: &str) -> Result<ContinueOutcome> {
        let job = self.checked(
            job_id,
            "dd_search",
            &[Phase::PickDone, Phase::DdSearchRunning],
        )?;
        self.client_step(job, Step::DdSearch).await
    }

    /// Client-driven step 5.
    pub async fn dd_analyze(&self, job_id: &str) -> Result<ContinueOutcome> {
        let job = self.checked(
            job_id,
            "dd_analyze",
            &[Phase::DdSearchDone, Phase::DdAnalyzeRunning],
        )?;
        self.client_step(job, Step::DdAnalyze).await
    }

    /// Operator stop.
    pub fn force_error(&self, job_id: &str, reason: &str) -> Result<JobSnapshot> {
        let job = self.store.force_error(job_id, reason)?;
        warn!(job_id, reason, "job forced to error");
        Ok(job.snapshot())
    }

    fn checked(&self, job_id: &str, operation: &str, allowed: &[Phase]) -> Result<Job> {
        let job = self.store.get(job_id)?;
        if !allowed.contains(&job.phase) {
            return Err(ScoutError::PhaseContractViolation {
                job_id: job_id.to_owned(),
                phase: job.phase.to_string(),
                operation: operation.to_owned(),
            });
        }
        Ok(job)
    }

    /// Client callers get a lost race as an error rather than an outcome.
    async fn client_step(&self, job: Job, step: Step) -> Result<ContinueOutcome> {
        let (job_id, expected) = (job.id.clone(), job.version);
        match self.execute(job, step).await? {
            ContinueOutcome::Superseded => Err(ScoutError::VersionConflict { job_id, expected }),
            other => Ok(other),
        }
    }

    async fn execute(&self, job: Job, step: Step) -> Result<ContinueOutcome> {
        let from = job.phase;
        let drive = job.drive;

        let mut claim = job;
        claim.set_phase(step.running());
        let claimed = match self.store.save(&claim) {
            Ok(j) => j,
            Err(ScoutError::VersionConflict { .. }) => {
                debug!(job_id = %claim.id, step = %step, "claim lost to a concurrent run");
                return Ok(ContinueOutcome::Superseded);
            }
            Err(e) => return Err(e),
        };
        debug!(
            job_id = %claimed.id,
            phase = %claimed.phase,
            retry_count = claimed.retry_count,
            "step claimed"
        );

        let budget = Duration::from_secs(self.ctx.pipeline.phase_budget_secs);
        let result = match tokio::time::timeout(budget, run_step(&self.ctx, step, &claimed)).await {
            Ok(r) => r,
            Err(_) => Err(ScoutError::Timeout(format!(
                "step {step} exceeded its {}s budget",
                budget.as_secs()
            ))),
        };

        let mut next = claimed.clone();
        match result.and_then(|output| output.apply(&mut next)) {
            Ok(()) => self.succeed(next, from, step, drive),
            Err(e) => self.fail(claimed, step, e, drive),
        }
    }

    fn succeed(
        &self,
        mut job: Job,
        from: Phase,
        step: Step,
        drive: Drive,
    ) -> Result<ContinueOutcome> {
        let to = step.done();
        job.set_phase(to);
        job.retry_count = 0;
        job.error_message = None;
        job.error_step = None;
        job.next_attempt_at = None;

        let saved = match self.store.save(&job) {
            Ok(j) => j,
            Err(ScoutError::VersionConflict { .. }) => return Ok(ContinueOutcome::Superseded),
            Err(e) => return Err(e),
        };
        if drive == Drive::Queue && !to.is_terminal() {
            self.queue.enqueue_continue(&saved.id, Utc::now())?;
        }
        info!(job_id = %saved.id, from = %from, to = %to, "step complete");
        Ok(ContinueOutcome::Advanced { from, to })
    }

    fn fail(
        &self,
        mut job: Job,
        step: Step,
        error: ScoutError,
        drive: Drive,
    ) -> Result<ContinueOutcome> {
        let max_retries = self.ctx.pipeline.max_retries;
        job.retry_count += 1;
        job.error_step = Some(step.as_str().to_owned());
        let message = error.to_string();

        if !error.is_retryable() || job.retry_count >= max_retries {
            let terminal = if error.is_retryable() {
                ScoutError::ExhaustedRetries {
                    step: step.as_str().to_owned(),
                    attempts: job.retry_count,
                    message,
                }
                .to_string()
            } else {
                message
            };
            job.set_phase(Phase::Error);
            job.error_message = Some(terminal.clone());
            job.next_attempt_at = None;
            if let Err(e) = self.store.save(&job) {
                return superseded_or(e);
            }
            warn!(
                job_id = %job.id,
                step = %step,
                retry_count = job.retry_count,
                error = %terminal,
                "step failed permanently"
            );
            return Ok(ContinueOutcome::Failed {
                step,
                error: terminal,
            });
        }

        let delay = retry_delay_secs(job.retry_count, self.ctx.pipeline.backoff_cap_secs);
        let retry_at =
            Utc::now() + chrono::Duration::seconds(i64::try_from(delay).unwrap_or(i64::MAX));
        job.error_message = Some(message.clone());
        job.next_attempt_at = Some(retry_at);
        let saved = match self.store.save(&job) {
            Ok(j) => j,
            Err(e) => return superseded_or(e),
        };
        if drive == Drive::Queue {
            self.queue.enqueue_continue(&saved.id, retry_at)?;
        }
        warn!(
            job_id = %saved.id,
            phase = %saved.phase,
            retry_count = saved.retry_count,
            retry_in_secs = delay,
            error = %message,
            "step failed, will retry"
        );
        Ok(ContinueOutcome::Retrying {
            phase: saved.phase,
            retry_count: saved.retry_count,
            retry_in_secs: delay,
            error: message,
        })
    }
}

fn superseded_or(e: ScoutError) -> Result<ContinueOutcome> {
    match e {
        ScoutError::VersionConflict { .. } => Ok(ContinueOutcome::Superseded),
        other => Err(other),
    }
}

/// `min(2^retry_count, cap)` seconds.
pub fn retry_delay_secs(retry_count: u32, cap_secs: u64) -> u64 {
    1u64.checked_shl(retry_count).unwrap_or(u64::MAX).min(cap_secs)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use crate::jobs::InMemoryJobStore;
    use crate::llm::LlmError;
    use crate::test_utils::{StubLlm, StubSearch, test_context};

    const THESIS_REPLY: &str = r#"{"summary":"seed fintech in France","keywords":["sme"],
        "queries":[{"category":"funding","query":"seed fintech france"}]}"#;

    fn inputs() -> ThesisInputs {
        ThesisInputs {
            sectors: vec!["fintech".into()],
            stage: "seed".into(),
            geography: "france".into(),
            ..Default::default()
        }
    }

    fn orchestrator(llm: StubLlm) -> (Arc<InMemoryJobStore>, Orchestrator) {
        let store = Arc::new(InMemoryJobStore::new());
        let orch = Orchestrator::new(
            store.clone(),
            store.clone(),
            test_context(StubSearch::empty(), llm),
        );
        (store, orch)
    }

    #[test]
    fn retry_delay_doubles_up_to_cap() {
        assert_eq!(retry_delay_secs(1, 60), 2);
        assert_eq!(retry_delay_secs(3, 60), 8);
        assert_eq!(retry_delay_secs(6, 60), 60);
        assert_eq!(retry_delay_secs(200, 60), 60);
    }

    #[tokio::test]
    async fn start_rejects_empty_thesis() {
        let (_, orch) = orchestrator(StubLlm::always(THESIS_REPLY));
        let err = orch.start(ThesisInputs::default(), Drive::Queue).unwrap_err();
        assert_eq!(err.code(), "INVALID_INPUT");
    }

    #[tokio::test]
    async fn continue_advances_and_enqueues_next() {
        let (store, orch) = orchestrator(StubLlm::always(THESIS_REPLY));
        let id = orch.start(inputs(), Drive::Queue).unwrap();
        assert_eq!(store.pending().unwrap(), 1);

        let outcome = orch.continue_job(&id).await.unwrap();
        assert_eq!(
            outcome,
            ContinueOutcome::Advanced {
                from: Phase::Pending,
                to: Phase::ThesisDone
            }
        );
        let snap = orch.status(&id).unwrap();
        assert_eq!(snap.phase, Phase::ThesisDone);
        assert_eq!(snap.version, 3);
        assert!(snap.thesis_summary.is_some());
        // Start message (unclaimed) coalesced with the follow-up.
        assert_eq!(store.pending().unwrap(), 1);
    }

    #[tokio::test]
    async fn client_drive_enqueues_nothing() {
        let (store, orch) = orchestrator(StubLlm::always(THESIS_REPLY));
        let id = orch.start(inputs(), Drive::Client).unwrap();
        assert_eq!(store.pending().unwrap(), 0);
        // Sourcing finds nothing with an empty search stub, so it retries.
        let outcome = orch.source(&id).await.unwrap();
        assert!(matches!(
            outcome,
            ContinueOutcome::Retrying {
                phase: Phase::SourcingRunning,
                retry_count: 1,
                ..
            }
        ));
        assert_eq!(store.pending().unwrap(), 0);
    }

    #[tokio::test]
    async fn retryable_failure_stays_in_running_phase() {
        let (store, orch) = orchestrator(StubLlm::failing(LlmError::Provider("503".into())));
        let id = orch.start(inputs(), Drive::Queue).unwrap();

        let outcome = orch.continue_job(&id).await.unwrap();
        let ContinueOutcome::Retrying { phase, retry_count, retry_in_secs, .. } = outcome else {
            panic!("expected retry, got {outcome:?}");
        };
        assert_eq!(phase, Phase::ThesisAnalyzing);
        assert_eq!(retry_count, 1);
        assert_eq!(retry_in_secs, 2);

        let job = store.get(&id).unwrap();
        assert_eq!(job.phase, Phase::ThesisAnalyzing);
        assert_eq!(job.error_step.as_deref(), Some("thesis"));
        assert!(job.error_message.is_some());
        assert!(job.next_attempt_at.is_some());
    }

    #[tokio::test]
    async fn exhausted_retries_end_in_error() {
        let (store, orch) = orchestrator(StubLlm::failing(LlmError::Request("reset".into())));
        let id = orch.start(inputs(), Drive::Client).unwrap();

        for _ in 1..3 {
            assert!(matches!(
                orch.continue_job(&id).await.unwrap(),
                ContinueOutcome::Retrying { .. }
            ));
        }
        let last = orch.continue_job(&id).await.unwrap();
        let ContinueOutcome::Failed { step, error } = last else {
            panic!("expected failure, got {last:?}");
        };
        assert_eq!(step, Step::Thesis);
        assert!(error.contains("EXHAUSTED_RETRIES"));
        assert_eq!(store.get(&id).unwrap().phase, Phase::Error);
        assert_eq!(store.pending().unwrap(), 0);
        assert_eq!(
            orch.continue_job(&id).await.unwrap(),
            ContinueOutcome::AlreadyTerminal { phase: Phase::Error }
        );
    }

    #[tokio::test]
    async fn continue_on_client_job_never_enqueues() {
        let (store, orch) = orchestrator(StubLlm::always(THESIS_REPLY));
        let id = orch.start(inputs(), Drive::Client).unwrap();
        assert_eq!(store.get(&id).unwrap().drive, Drive::Client);

        let outcome = orch.continue_job(&id).await.unwrap();
        assert!(matches!(outcome, ContinueOutcome::Advanced { to: Phase::ThesisDone, .. }));
        assert_eq!(store.pending().unwrap(), 0);

        // Sourcing retries on an empty search; the retry is not enqueued either.
        let outcome = orch.continue_job(&id).await.unwrap();
        assert!(matches!(outcome, ContinueOutcome::Retrying { .. }));
        assert_eq!(store.pending().unwrap(), 0);
    }

    #[tokio::test]
    async fn client_step_on_queue_job_keeps_the_queue_going() {
        let (store, orch) = orchestrator(StubLlm::always(THESIS_REPLY));
        let id = orch.start(inputs(), Drive::Queue).unwrap();
        let claimed = store.claim_due(Utc::now(), 10, Duration::from_secs(60)).unwrap();
        store.ack(claimed[0].id).unwrap();

        let outcome = orch.source(&id).await.unwrap();
        assert!(matches!(outcome, ContinueOutcome::Retrying { .. }));
        assert_eq!(store.pending().unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn step_over_phase_budget_is_a_retryable_timeout() {
        let store = Arc::new(InMemoryJobStore::new());
        let mut ctx = test_context(
            StubSearch::empty(),
            StubLlm::slow(Duration::from_secs(30), THESIS_REPLY),
        );
        ctx.pipeline.phase_budget_secs = 5;
        let orch = Orchestrator::new(store.clone(), store.clone(), ctx);
        let id = orch.start(inputs(), Drive::Client).unwrap();

        let outcome = orch.continue_job(&id).await.unwrap();
        let ContinueOutcome::Retrying { phase, retry_count, error, .. } = outcome else {
            panic!("expected retry, got {outcome:?}");
        };
        assert_eq!(phase, Phase::ThesisAnalyzing);
        assert_eq!(retry_count, 1);
        assert!(error.contains("TIMEOUT_ERROR"), "{error}");
        let job = store.get(&id).unwrap();
        assert!(job.thesis_summary.is_none());
        assert_eq!(job.error_step.as_deref(), Some("thesis"));
    }

    #[tokio::test]
    async fn permanent_failure_skips_retries() {
        let (store, orch) = orchestrator(StubLlm::failing(LlmError::Config("no API key".into())));
        let id = orch.start(inputs(), Drive::Queue).unwrap();
        let outcome = orch.continue_job(&id).await.unwrap();
        assert!(matches!(outcome, ContinueOutcome::Failed { step: Step::Thesis, .. }));
        let job = store.get(&id).unwrap();
        assert_eq!(job.phase, Phase::Error);
        assert_eq!(job.retry_count, 1);
    }

    #[tokio::test]
    async fn wrong_phase_is_contract_violation_without_write() {
        let (store, orch) = orchestrator(StubLlm::always(THESIS_REPLY));
        let id = orch.start(inputs(), Drive::Client).unwrap();
        let before = store.get(&id).unwrap();

        for err in [
            orch.pick(&id).await.unwrap_err(),
            orch.dd_search(&id).await.unwrap_err(),
            orch.dd_analyze(&id).await.unwrap_err(),
        ] {
            assert_eq!(err.code(), "PHASE_CONTRACT_VIOLATION");
            assert!(!err.is_retryable());
        }
        assert_eq!(store.get(&id).unwrap(), before);
    }

    #[tokio::test]
    async fn stale_claim_is_superseded() {
        let (store, orch) = orchestrator(StubLlm::always(THESIS_REPLY));
        let id = orch.start(inputs(), Drive::Queue).unwrap();
        let stale = store.get(&id).unwrap();
        orch.continue_job(&id).await.unwrap();

        let outcome = orch.execute(stale, Step::Thesis).await.unwrap();
        assert_eq!(outcome, ContinueOutcome::Superseded);
        assert_eq!(store.get(&id).unwrap().phase, Phase::ThesisDone);
    }

    #[tokio::test]
    async fn force_error_stops_the_job() {
        let (_, orch) = orchestrator(StubLlm::always(THESIS_REPLY));
        let id = orch.start(inputs(), Drive::Queue).unwrap();
        let snap = orch.force_error(&id, "operator stop").unwrap();
        assert_eq!(snap.phase, Phase::Error);
        assert!(matches!(
            orch.continue_job(&id).await.unwrap(),
            ContinueOutcome::AlreadyTerminal { .. }
        ));
    }

    #[test]
    fn outcome_serializes_with_tag() {
        let json = serde_json::to_value(ContinueOutcome::Advanced {
            from: Phase::Pending,
            to: Phase::ThesisDone,
        })
        .unwrap();
        assert_eq!(json["outcome"], "advanced");
        assert_eq!(json["to"], "thesis_done");
    }
}
