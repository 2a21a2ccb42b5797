//! Job record, phases and steps.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::scoring::ScoredCandidate;
use crate::thesis::{ThesisInputs, ThesisSummary};

/// Number of steps from `pending` to `dd_done`.
pub const TOTAL_STEPS: u8 = 5;

/// Persisted pipeline position.
///
/// Each step moves resting → running → next resting. `error` is absorbing
/// and reachable from every non-terminal phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Pending,
    ThesisAnalyzing,
    ThesisDone,
    SourcingRunning,
    SourcingDone,
    Picking,
    PickDone,
    DdSearchRunning,
    DdSearchDone,
    DdAnalyzeRunning,
    DdDone,
    Error,
}

impl Phase {
    const ORDERED: [Phase; 11] = [
        Self::Pending,
        Self::ThesisAnalyzing,
        Self::ThesisDone,
        Self::SourcingRunning,
        Self::SourcingDone,
        Self::Picking,
        Self::PickDone,
        Self::DdSearchRunning,
        Self::DdSearchDone,
        Self::DdAnalyzeRunning,
        Self::DdDone,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::ThesisAnalyzing => "thesis_analyzing",
            Self::ThesisDone => "thesis_done",
            Self::SourcingRunning => "sourcing_running",
            Self::SourcingDone => "sourcing_done",
            Self::Picking => "picking",
            Self::PickDone => "pick_done",
            Self::DdSearchRunning => "dd_search_running",
            Self::DdSearchDone => "dd_search_done",
            Self::DdAnalyzeRunning => "dd_analyze_running",
            Self::DdDone => "dd_done",
            Self::Error => "error",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        if raw == "error" {
            return Some(Self::Error);
        }
        Self::ORDERED.iter().copied().find(|p| p.as_str() == raw)
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::DdDone | Self::Error)
    }

    /// Position in the happy path; `error` sorts after everything.
    #[must_use]
    pub fn ordinal(self) -> usize {
        Self::ORDERED
            .iter()
            .position(|p| *p == self)
            .unwrap_or(Self::ORDERED.len())
    }

    /// The step a `continue` in this phase runs, if any.
    #[must_use]
    pub fn step(self) -> Option<Step> {
        match self {
            Self::Pending | Self::ThesisAnalyzing => Some(Step::Thesis),
            Self::ThesisDone | Self::SourcingRunning => Some(Step::Sourcing),
            Self::SourcingDone | Self::Picking => Some(Step::Picking),
            Self::PickDone | Self::DdSearchRunning => Some(Step::DdSearch),
            Self::DdSearchDone | Self::DdAnalyzeRunning => Some(Step::DdAnalyze),
            Self::DdDone | Self::Error => None,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One unit of pipeline work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Thesis,
    Sourcing,
    Picking,
    DdSearch,
    DdAnalyze,
}

impl Step {
    pub const ALL: [Step; 5] = [
        Self::Thesis,
        Self::Sourcing,
        Self::Picking,
        Self::DdSearch,
        Self::DdAnalyze,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Thesis => "thesis",
            Self::Sourcing => "sourcing",
            Self::Picking => "picking",
            Self::DdSearch => "dd_search",
            Self::DdAnalyze => "dd_analyze",
        }
    }

    /// 1-based position.
    #[must_use]
    pub fn number(self) -> u8 {
        match self {
            Self::Thesis => 1,
            Self::Sourcing => 2,
            Self::Picking => 3,
            Self::DdSearch => 4,
            Self::DdAnalyze => 5,
        }
    }

    /// Resting phase the step starts from.
    #[must_use]
    pub fn from(self) -> Phase {
        match self {
            Self::Thesis => Phase::Pending,
            Self::Sourcing => Phase::ThesisDone,
            Self::Picking => Phase::SourcingDone,
            Self::DdSearch => Phase::PickDone,
            Self::DdAnalyze => Phase::DdSearchDone,
        }
    }

    #[must_use]
    pub fn running(self) -> Phase {
        match self {
            Self::Thesis => Phase::ThesisAnalyzing,
            Self::Sourcing => Phase::SourcingRunning,
            Self::Picking => Phase::Picking,
            Self::DdSearch => Phase::DdSearchRunning,
            Self::DdAnalyze => Phase::DdAnalyzeRunning,
        }
    }

    /// Resting phase reached on success.
    #[must_use]
    pub fn done(self) -> Phase {
        match self {
            Self::Thesis => Phase::ThesisDone,
            Self::Sourcing => Phase::SourcingDone,
            Self::Picking => Phase::PickDone,
            Self::DdSearch => Phase::DdSearchDone,
            Self::DdAnalyze => Phase::DdDone,
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who triggers the next step of a job. Fixed at `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Drive {
    /// Successes and retries enqueue a `continue` message.
    #[default]
    Queue,
    /// The caller invokes each step explicitly; nothing is enqueued.
    Client,
}

impl Drive {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queue => "queue",
            Self::Client => "client",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "queue" => Some(Self::Queue),
            "client" => Some(Self::Client),
            _ => None,
        }
    }
}

/// The persisted aggregate root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub phase: Phase,
    pub current_step: u8,
    pub total_steps: u8,
    #[serde(default)]
    pub drive: Drive,
    pub thesis_inputs: ThesisInputs,
    pub thesis_summary: Option<ThesisSummary>,
    /// Payload handed from one step to the next.
    pub checkpoint: Option<Value>,
    pub picked_candidate: Option<ScoredCandidate>,
    pub result_payload: Option<Value>,
    pub error_message: Option<String>,
    pub error_step: Option<String>,
    pub retry_count: u32,
    /// Optimistic-concurrency token; bumped by every write.
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub next_attempt_at: Option<DateTime<Utc>>,
}

impl Job {
    /// A fresh `pending` job. The store assigns version 1 on create.
    pub fn new(thesis_inputs: ThesisInputs) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            phase: Phase::Pending,
            current_step: Step::Thesis.number(),
            total_steps: TOTAL_STEPS,
            drive: Drive::default(),
            thesis_inputs,
            thesis_summary: None,
            checkpoint: None,
            picked_candidate: None,
            result_payload: None,
            error_message: None,
            error_step: None,
            retry_count: 0,
            version: 0,
            created_at: now,
            updated_at: now,
            next_attempt_at: None,
        }
    }

    pub fn with_drive(mut self, drive: Drive) -> Self {
        self.drive = drive;
        self
    }

    /// Move to `phase`, keeping `current_step` in sync.
    pub fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
        if let Some(step) = phase.step() {
            self.current_step = step.number();
        } else if phase == Phase::DdDone {
            self.current_step = TOTAL_STEPS;
        }
    }

    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            id: self.id.clone(),
            phase: self.phase,
            current_step: self.current_step,
            total_steps: self.total_steps,
            drive: self.drive,
            retry_count: self.retry_count,
            error_message: self.error_message.clone(),
            error_step: self.error_step.clone(),
            version: self.version,
            created_at: self.created_at,
            updated_at: self.updated_at,
            next_attempt_at: self.next_attempt_at,
            thesis_summary: self.thesis_summary.clone(),
            picked_candidate: self.picked_candidate.clone(),
            result_payload: self.result_payload.clone(),
        }
    }
}

/// Client-facing view of a job; omits inputs and the checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub id: String,
    pub phase: Phase,
    pub current_step: u8,
    pub total_steps: u8,
    pub drive: Drive,
    pub retry_count: u32,
    pub error_message: Option<String>,
    pub error_step: Option<String>,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub next_attempt_at: Option<DateTime<Utc>>,
    pub thesis_summary: Option<ThesisSummary>,
    pub picked_candidate: Option<ScoredCandidate>,
    pub result_payload: Option<Value>,
}
