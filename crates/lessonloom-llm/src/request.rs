//! Generic request and result types
//!
//! These are the provider-neutral shapes every adapter translates from and
//! to.

use crate::failure::Failure;
use serde::{Deserialize, Serialize};

/// Desired shape of the generated content
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    /// Structured JSON (parsed leniently)
    Json,
    /// Free text
    #[default]
    Text,
}

/// Token usage information
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    /// Prompt tokens
    pub prompt_tokens: u32,
    /// Completion tokens
    pub completion_tokens: u32,
    /// Total tokens
    pub total_tokens: u32,
}

impl TokenUsage {
    /// Build usage from prompt and completion counts
    #[must_use]
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
        }
    }
}

/// Provider-neutral generation request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    /// Prompt text
    pub prompt: String,
    /// Sampling temperature override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Output token budget override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Requested content shape
    #[serde(default)]
    pub response_format: ResponseFormat,
    /// Streaming hint; results are always returned complete
    #[serde(default)]
    pub streaming: bool,
    /// Model to use instead of the backend's configured model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_override: Option<String>,
}

impl GenerateRequest {
    /// Create a text request
    #[must_use]
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    /// Request JSON output
    #[must_use]
    pub fn json(mut self) -> Self {
        self.response_format = ResponseFormat::Json;
        self
    }

    /// Set temperature
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set max tokens
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Override the model for this call
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model_override = Some(model.into());
        self
    }

    /// Set the streaming hint
    #[must_use]
    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    /// Model to send: the override if present, else `configured`
    #[must_use]
    pub fn model_or<'a>(&'a self, configured: &'a str) -> &'a str {
        match self.model_override.as_deref() {
            Some(model) if !model.trim().is_empty() => model,
            _ => configured,
        }
    }
}

/// Successful generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateSuccess {
    /// Parsed JSON, or the raw text as a JSON string
    pub content: serde_json::Value,
    /// Token usage when reported by the provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
    /// Backend that served the call
    pub backend_id: String,
    /// Model reported by the provider
    pub model: String,
}

impl GenerateSuccess {
    /// Build a success from raw provider text, honouring the requested format
    #[must_use]
    pub fn from_text(
        text: String,
        format: ResponseFormat,
        usage: Option<TokenUsage>,
        backend_id: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        let content = match format {
            ResponseFormat::Json => {
                crate::json::parse_lenient(&text).unwrap_or(serde_json::Value::String(text))
            }
            ResponseFormat::Text => serde_json::Value::String(text),
        };
        Self {
            content,
            usage,
            backend_id: backend_id.into(),
            model: model.into(),
        }
    }

    /// Content as text (JSON values are rendered compactly)
    #[must_use]
    pub fn text(&self) -> String {
        match &self.content {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// Outcome of a generation call: success or a classified failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum GenerateResult {
    /// Content was produced
    Success(GenerateSuccess),
    /// The call failed
    Failure(Failure),
}

impl GenerateResult {
    /// Whether the call succeeded
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Backend id recorded on either variant
    #[must_use]
    pub fn backend_id(&self) -> &str {
        match self {
            Self::Success(s) => &s.backend_id,
            Self::Failure(f) => &f.backend_id,
        }
    }

    /// The failure, if any
    #[must_use]
    pub fn failure(&self) -> Option<&Failure> {
        match self {
            Self::Failure(f) => Some(f),
            Self::Success(_) => None,
        }
    }

    /// Token usage, if the call succeeded and reported any
    #[must_use]
    pub fn usage(&self) -> Option<TokenUsage> {
        match self {
            Self::Success(s) => s.usage,
            Self::Failure(_) => None,
        }
    }
}

impl From<Failure> for GenerateResult {
    fn from(failure: Failure) -> Self {
        Self::Failure(failure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_builder() {
        let request = GenerateRequest::new("Plan a lesson")
            .json()
            .with_temperature(0.2)
            .with_max_tokens(512)
            .with_model("gpt-4o-mini");

        assert_eq!(request.response_format, ResponseFormat::Json);
        assert_eq!(request.temperature, Some(0.2));
        assert_eq!(request.max_tokens, Some(512));
        assert_eq!(request.model_or("gpt-4o"), "gpt-4o-mini");
    }

    #[test]
    fn test_model_or_ignores_blank_override() {
        let request = GenerateRequest::new("x").with_model("  ");
        assert_eq!(request.model_or("configured"), "configured");
    }

    #[test]
    fn test_success_from_fenced_json() {
        let success = GenerateSuccess::from_text(
            "```json\n{\"ok\": true}\n```".to_string(),
            ResponseFormat::Json,
            None,
            "b1",
            "m",
        );
        assert_eq!(success.content, json!({"ok": true}));
    }

    #[test]
    fn test_success_json_falls_back_to_text() {
        let success = GenerateSuccess::from_text(
            "not json".to_string(),
            ResponseFormat::Json,
            None,
            "b1",
            "m",
        );
        assert_eq!(success.content, json!("not json"));
        assert_eq!(success.text(), "not json");
    }

    #[test]
    fn test_usage_total() {
        assert_eq!(TokenUsage::new(10, 5).total_tokens, 15);
    }
}
