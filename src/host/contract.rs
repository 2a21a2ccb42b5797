//! Versioned command/response envelopes for the JSON host bridge.

use serde::{Deserialize, Serialize};
use serde_json::json;

/// Contract version for command/response envelopes.
pub const EVENT_VERSION: u32 = 1;

/// Commands the host bridge accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandName {
    Ping,
    Version,
    Start,
    Status,
    Continue,
    Source,
    Pick,
    DdSearch,
    DdAnalyze,
    ForceError,
}

impl CommandName {
    /// Render command name to wire format.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ping => "ping",
            Self::Version => "version",
            Self::Start => "start",
            Self::Status => "status",
            Self::Continue => "continue",
            Self::Source => "source",
            Self::Pick => "pick",
            Self::DdSearch => "dd_search",
            Self::DdAnalyze => "dd_analyze",
            Self::ForceError => "force_error",
        }
    }

    /// Parse a command name from wire format.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "ping" => Some(Self::Ping),
            "version" => Some(Self::Version),
            "start" => Some(Self::Start),
            "status" => Some(Self::Status),
            "continue" => Some(Self::Continue),
            "source" => Some(Self::Source),
            "pick" => Some(Self::Pick),
            "dd_search" => Some(Self::DdSearch),
            "dd_analyze" => Some(Self::DdAnalyze),
            "force_error" => Some(Self::ForceError),
            _ => None,
        }
    }
}

/// A versioned response envelope from the bridge to its caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub v: u32,
    pub request_id: String,
    pub ok: bool,
    pub payload: serde_json::Value,
    pub error: Option<String>,
}

impl ResponseEnvelope {
    #[must_use]
    pub fn ok(request_id: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            v: EVENT_VERSION,
            request_id: request_id.into(),
            ok: true,
            payload,
            error: None,
        }
    }

    /// Failure response. The payload repeats the message next to its
    /// stable code, `{"error": "...", "code": "..."}`.
    #[must_use]
    pub fn error(request_id: impl Into<String>, code: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            v: EVENT_VERSION,
            request_id: request_id.into(),
            ok: false,
            payload: json!({ "error": message, "code": code }),
            error: Some(message),
        }
    }
}

/// A versioned command envelope from the caller to the bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandEnvelope {
    pub v: u32,
    pub request_id: String,
    pub command: CommandName,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl CommandEnvelope {
    #[must_use]
    pub fn new(
        request_id: impl Into<String>,
        command: CommandName,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            v: EVENT_VERSION,
            request_id: request_id.into(),
            command,
            payload,
        }
    }

    /// Validate envelope version and required identifiers.
    pub fn validate(&self) -> Result<(), ContractError> {
        if self.v != EVENT_VERSION {
            return Err(ContractError::new(
                ContractErrorKind::UnsupportedVersion,
                format!(
                    "unsupported contract version {}; expected {}",
                    self.v, EVENT_VERSION
                ),
            ));
        }
        if self.request_id.trim().is_empty() {
            return Err(ContractError::new(
                ContractErrorKind::InvalidEnvelope,
                "request_id cannot be empty".to_owned(),
            ));
        }
        Ok(())
    }
}

/// Contract validation error categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractErrorKind {
    UnsupportedVersion,
    InvalidEnvelope,
}

impl ContractErrorKind {
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::UnsupportedVersion => "UNSUPPORTED_VERSION",
            Self::InvalidEnvelope => "INVALID_ENVELOPE",
        }
    }
}

/// Contract validation error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("[{}] {message}", kind.code())]
pub struct ContractError {
    pub kind: ContractErrorKind,
    pub message: String,
}

impl ContractError {
    #[must_use]
    pub fn new(kind: ContractErrorKind, message: String) -> Self {
        Self { kind, message }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn command_names_round_trip() {
        for name in [
            CommandName::Ping,
            CommandName::Version,
            CommandName::Start,
            CommandName::Status,
            CommandName::Continue,
            CommandName::Source,
            CommandName::Pick,
            CommandName::DdSearch,
            CommandName::DdAnalyze,
            CommandName::ForceError,
        ] {
            assert_eq!(CommandName::parse(name.as_str()), Some(name));
            let wire = serde_json::to_value(name).unwrap();
            assert_eq!(wire, name.as_str());
        }
        assert_eq!(CommandName::parse("runtime.start"), None);
    }

    #[test]
    fn envelope_without_payload_defaults_to_null() {
        let env: CommandEnvelope =
            serde_json::from_str(r#"{"v":1,"request_id":"r1","command":"ping"}"#).unwrap();
        assert_eq!(env.command, CommandName::Ping);
        assert!(env.payload.is_null());
        env.validate().unwrap();
    }

    #[test]
    fn validate_rejects_wrong_version_and_blank_id() {
        let mut env = CommandEnvelope::new("r1", CommandName::Status, json!({}));
        env.v = 2;
        assert_eq!(
            env.validate().unwrap_err().kind,
            ContractErrorKind::UnsupportedVersion
        );
        let env = CommandEnvelope::new("  ", CommandName::Status, json!({}));
        assert_eq!(
            env.validate().unwrap_err().kind,
            ContractErrorKind::InvalidEnvelope
        );
    }

    #[test]
    fn error_response_carries_code_in_payload() {
        let resp = ResponseEnvelope::error("r1", "JOB_NOT_FOUND", "no such job");
        assert!(!resp.ok);
        assert_eq!(resp.error.as_deref(), Some("no such job"));
        assert_eq!(resp.payload["error"], "no such job");
        assert_eq!(resp.payload["code"], "JOB_NOT_FOUND");
    }
}
