//! Resumable job pipeline: persisted state machine, durable continue
//! queue, phase handlers and the worker that drains the queue.

pub mod batch;
pub mod memory;
pub mod orchestrator;
pub mod phases;
mod schema;
pub mod sqlite;
pub mod store;
pub mod types;
pub mod worker;

pub use memory::InMemoryJobStore;
pub use orchestrator::{ContinueOutcome, Orchestrator, retry_delay_secs};
pub use phases::{PhaseContext, PhaseOutput, run_step};
pub use sqlite::SqliteJobStore;
pub use store::{ClaimedMessage, ContinueQueue, JobStore};
pub use types::{Drive, Job, JobSnapshot, Phase, Step, TOTAL_STEPS};
pub use worker::Worker;
