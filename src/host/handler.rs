//! Routes host commands onto the orchestrator.

use std::sync::Arc;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, warn};

use crate::error::{Result, ScoutError};
use crate::host::contract::{CommandEnvelope, CommandName, EVENT_VERSION, ResponseEnvelope};
use crate::jobs::{ContinueOutcome, Drive, Orchestrator};
use crate::thesis::ThesisInputs;

const DEFAULT_FORCE_REASON: &str = "stopped by operator";

#[derive(Debug, Deserialize)]
struct StartPayload {
    thesis: ThesisInputs,
    #[serde(default)]
    drive: Drive,
}

#[derive(Debug, Deserialize)]
struct JobPayload {
    job_id: String,
}

#[derive(Debug, Deserialize)]
struct ForceErrorPayload {
    job_id: String,
    #[serde(default)]
    reason: Option<String>,
}

/// Turns command envelopes into response envelopes. Never fails: every
/// error becomes an `ok: false` response carrying the error code.
pub struct HostHandler {
    orchestrator: Arc<Orchestrator>,
}

impl HostHandler {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self { orchestrator }
    }

    pub async fn handle(&self, envelope: CommandEnvelope) -> ResponseEnvelope {
        if let Err(e) = envelope.validate() {
            warn!(request_id = %envelope.request_id, error = %e, "invalid command envelope");
            return ResponseEnvelope::error(envelope.request_id, e.kind.code(), e.message);
        }
        debug!(
            request_id = %envelope.request_id,
            command = envelope.command.as_str(),
            "host command"
        );
        match self.route(&envelope).await {
            Ok(payload) => ResponseEnvelope::ok(envelope.request_id, payload),
            Err(e) => {
                warn!(
                    request_id = %envelope.request_id,
                    command = envelope.command.as_str(),
                    code = e.code(),
                    error = %e,
                    "host command failed"
                );
                ResponseEnvelope::error(envelope.request_id, e.code(), e.to_string())
            }
        }
    }

    async fn route(&self, envelope: &CommandEnvelope) -> Result<serde_json::Value> {
        match envelope.command {
            CommandName::Ping => Ok(json!({"pong": true})),
            CommandName::Version => Ok(json!({
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
                "contract_version": EVENT_VERSION,
            })),
            CommandName::Start => self.handle_start(envelope),
            CommandName::Status => {
                let p: JobPayload = parse_payload(envelope)?;
                Ok(serde_json::to_value(self.orchestrator.status(&p.job_id)?)?)
            }
            CommandName::Continue => {
                let p: JobPayload = parse_payload(envelope)?;
                let outcome = self.orchestrator.continue_job(&p.job_id).await?;
                self.outcome_payload(&p.job_id, outcome)
            }
            CommandName::Source => {
                let p: JobPayload = parse_payload(envelope)?;
                let outcome = self.orchestrator.source(&p.job_id).await?;
                self.outcome_payload(&p.job_id, outcome)
            }
            CommandName::Pick => {
                let p: JobPayload = parse_payload(envelope)?;
                let outcome = self.orchestrator.pick(&p.job_id).await?;
                self.outcome_payload(&p.job_id, outcome)
            }
            CommandName::DdSearch => {
                let p: JobPayload = parse_payload(envelope)?;
                let outcome = self.orchestrator.dd_search(&p.job_id).await?;
                self.outcome_payload(&p.job_id, outcome)
            }
            CommandName::DdAnalyze => {
                let p: JobPayload = parse_payload(envelope)?;
                let outcome = self.orchestrator.dd_analyze(&p.job_id).await?;
                self.outcome_payload(&p.job_id, outcome)
            }
            CommandName::ForceError => {
                let p: ForceErrorPayload = parse_payload(envelope)?;
                let reason = p.reason.as_deref().unwrap_or(DEFAULT_FORCE_REASON);
                Ok(serde_json::to_value(
                    self.orchestrator.force_error(&p.job_id, reason)?,
                )?)
            }
        }
    }

    fn handle_start(&self, envelope: &CommandEnvelope) -> Result<serde_json::Value> {
        let p: StartPayload = parse_payload(envelope)?;
        let job_id = self.orchestrator.start(p.thesis, p.drive)?;
        let snapshot = self.orchestrator.status(&job_id)?;
        Ok(json!({ "job_id": job_id, "job": snapshot }))
    }

    fn outcome_payload(&self, job_id: &str, outcome: ContinueOutcome) -> Result<serde_json::Value> {
        let snapshot = self.orchestrator.status(job_id)?;
        Ok(json!({ "result": outcome, "job": snapshot }))
    }
}

fn parse_payload<T: DeserializeOwned>(envelope: &CommandEnvelope) -> Result<T> {
    serde_json::from_value(envelope.payload.clone()).map_err(|e| {
        ScoutError::InvalidInput(format!(
            "invalid payload for {}: {e}",
            envelope.command.as_str()
        ))
    })
}
