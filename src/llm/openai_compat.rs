//! OpenAI-compatible chat completions provider.
//!
//! Works with any vendor exposing `POST {base_url}/chat/completions`
//! (OpenAI, Mistral, Groq, OpenRouter, local servers). Non-streaming: the
//! pipeline needs the whole reply before extraction anyway.

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use super::{CompletionOptions, LlmError, LlmProvider};
use crate::config::LlmProviderConfig;

/// One OpenAI-compatible endpoint.
pub struct OpenAiCompatProvider {
    client: reqwest::Client,
    name: String,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl OpenAiCompatProvider {
    pub fn new(
        client: reqwest::Client,
        name: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            client,
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            model: model.into(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        }
    }

    /// Build from config, reading the key from the named env var.
    pub fn from_config(client: reqwest::Client, config: &LlmProviderConfig) -> Self {
        let api_key = std::env::var(&config.api_key_env).ok();
        Self::new(
            client,
            config.name.clone(),
            config.base_url.clone(),
            config.model.clone(),
            api_key,
        )
    }

    fn request_body(
        &self,
        system: &str,
        user: &str,
        options: &CompletionOptions,
    ) -> serde_json::Value {
        let mut body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
            "temperature": options.temperature,
            "max_tokens": options.max_tokens,
        });
        if options.json_mode {
            body["response_format"] = json!({"type": "json_object"});
        }
        body
    }

    /// Map an HTTP error status to the appropriate [`LlmError`].
    fn map_http_error(&self, status: reqwest::StatusCode, body: &str) -> LlmError {
        let message = extract_error_message(body);
        let name = &self.name;
        match status.as_u16() {
            401 | 403 => LlmError::Auth(format!("{name} authentication failed: {message}")),
            429 => LlmError::RateLimited(format!("{name} rate limited: {message}")),
            code if status.is_server_error() => {
                LlmError::Provider(format!("{name} HTTP {code}: {message}"))
            }
            code => LlmError::BadRequest(format!("{name} HTTP {code}: {message}")),
        }
    }
}

/// Extract an error message from an OpenAI-style error body.
fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(String::from)
        })
        .unwrap_or_else(|| body.to_string())
}

#[async_trait]
impl LlmProvider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn complete(
        &self,
        system: &str,
        user: &str,
        options: &CompletionOptions,
    ) -> Result<String, LlmError> {
        let Some(api_key) = &self.api_key else {
            return Err(LlmError::Config(format!("{} has no API key", self.name)));
        };
        let url = format!("{}/chat/completions", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&self.request_body(system, user, options))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout(format!("{} request timed out", self.name))
                } else {
                    LlmError::Request(format!("{} request failed: {e}", self.name))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(self.map_http_error(status, &body_text));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| LlmError::Provider(format!("{} returned invalid JSON: {e}", self.name)))?;

        let content = body
            .pointer("/choices/0/message/content")
            .and_then(|c| c.as_str())
            .ok_or_else(|| LlmError::Provider(format!("{} reply has no content", self.name)))?;

        debug!(provider = %self.name, chars = content.len(), "completion received");
        Ok(content.to_owned())
    }
}
