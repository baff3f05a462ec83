//! OpenAI - Chat Completions API adapter
//!
//! The chat wire types here are OpenAI-compatible and are reused by the
//! OpenRouter adapter.

use super::http::{base_url, HttpTransport};
use crate::backend::{
    AdapterOptions, Backend, BackendConfig, Capabilities, OpenAiTuning, Tuning,
};
use crate::error::{Error, Result};
use crate::failure::{ErrorKind, Failure};
use crate::request::{GenerateRequest, GenerateResult, GenerateSuccess, ResponseFormat, TokenUsage};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// OpenAI API base URL
pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// Built-in OpenAI model catalogue
pub const MODELS: &[&str] = &[
    "gpt-4o",
    "gpt-4o-mini",
    "gpt-4.1",
    "gpt-4.1-mini",
    "gpt-4.1-nano",
    "o3-mini",
];

/// Default OpenAI model
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// System instruction added in JSON mode (the API requires the word JSON)
pub(crate) const JSON_INSTRUCTION: &str =
    "Respond with a single valid JSON value and nothing else.";

// ============================================================================
// Wire Types (OpenAI-compatible)
// ============================================================================

#[derive(Debug, Serialize)]
pub(crate) struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ChatResponseFormat>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub stream: bool,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub(crate) struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Serialize, PartialEq)]
pub(crate) struct ChatResponseFormat {
    pub r#type: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatResponse {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
    #[serde(default)]
    pub usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatChoice {
    pub message: ChatResponseMessage,
    #[serde(default)]
    #[allow(dead_code)] // Fields used by serde for JSON deserialization
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatUsage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ModelList {
    #[serde(default)]
    pub data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ModelEntry {
    pub id: String,
}

/// Sampling values after merging per-call overrides into tuning
pub(crate) struct Sampling {
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: Option<f32>,
}

/// Build an OpenAI-compatible chat request
pub(crate) fn build_chat_request(
    model: &str,
    sampling: Sampling,
    request: &GenerateRequest,
) -> ChatRequest {
    let mut messages = Vec::with_capacity(2);
    let response_format = match request.response_format {
        ResponseFormat::Json => {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: JSON_INSTRUCTION.to_string(),
            });
            Some(ChatResponseFormat {
                r#type: "json_object".to_string(),
            })
        }
        ResponseFormat::Text => None,
    };
    messages.push(ChatMessage {
        role: "user".to_string(),
        content: request.prompt.clone(),
    });

    ChatRequest {
        model: model.to_string(),
        messages,
        temperature: request.temperature.unwrap_or(sampling.temperature),
        max_tokens: request.max_tokens.unwrap_or(sampling.max_tokens),
        top_p: sampling.top_p,
        response_format,
        // Responses are aggregated; the wire call is never streamed.
        stream: false,
    }
}

/// Convert an OpenAI-compatible chat response into a result
pub(crate) fn parse_chat_response(
    response: ChatResponse,
    format: ResponseFormat,
    backend_id: &str,
    requested_model: &str,
) -> GenerateResult {
    let Some(choice) = response.choices.into_iter().next() else {
        return Failure::new(ErrorKind::ParsingError, "no choices in response", backend_id).into();
    };
    let Some(text) = choice.message.content else {
        return Failure::new(ErrorKind::ParsingError, "empty message content", backend_id).into();
    };

    let usage = response.usage.map(|u| {
        let mut usage = TokenUsage::new(u.prompt_tokens, u.completion_tokens);
        // Some compatible servers omit the total
        if u.total_tokens != 0 {
            usage.total_tokens = u.total_tokens;
        }
        usage
    });

    GenerateResult::Success(GenerateSuccess::from_text(
        text,
        format,
        usage,
        backend_id,
        response.model.unwrap_or_else(|| requested_model.to_string()),
    ))
}

// ============================================================================
// Adapter
// ============================================================================

/// OpenAI adapter
pub struct OpenAiBackend {
    config: BackendConfig,
    tuning: OpenAiTuning,
    transport: HttpTransport,
    base_url: String,
}

impl OpenAiBackend {
    /// Create an adapter for an OpenAI config
    pub fn new(config: BackendConfig, options: AdapterOptions) -> Result<Self> {
        let Tuning::OpenAi(tuning) = config.tuning.clone() else {
            return Err(Error::InvalidConfig(format!(
                "backend {} is not an OpenAI config",
                config.id
            )));
        };
        let base_url = base_url(tuning.base_url.as_deref(), OPENAI_API_BASE);

        Ok(Self {
            transport: HttpTransport::new(options)?,
            config,
            tuning,
            base_url,
        })
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let builder = builder.bearer_auth(self.config.credential.expose());
        match &self.tuning.organization {
            Some(org) => builder.header("OpenAI-Organization", org),
            None => builder,
        }
    }
}

#[async_trait::async_trait]
impl Backend for OpenAiBackend {
    fn config(&self) -> &BackendConfig {
        &self.config
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            response_formats: vec![ResponseFormat::Json, ResponseFormat::Text],
            vision: true,
            function_calling: true,
            max_context_tokens: 128_000,
            models: MODELS.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    #[instrument(skip(self, request), fields(backend = %self.config.id))]
    async fn generate(&self, request: &GenerateRequest) -> GenerateResult {
        let model = request.model_or(&self.config.model);
        let chat_request = build_chat_request(
            model,
            Sampling {
                temperature: self.tuning.temperature,
                max_tokens: self.tuning.max_tokens,
                top_p: self.tuning.top_p,
            },
            request,
        );

        debug!(model = %model, "Sending request to OpenAI");

        let url = format!("{}/chat/completions", self.base_url);
        match self
            .transport
            .send_json::<ChatResponse, _>(&self.config.id, |client| {
                self.authorized(client.post(&url)).json(&chat_request)
            })
            .await
        {
            Ok(response) => {
                parse_chat_response(response, request.response_format, &self.config.id, model)
            }
            Err(failure) => failure.into(),
        }
    }

    async fn list_models(&self) -> Vec<String> {
        let url = format!("{}/models", self.base_url);
        match self
            .transport
            .send_json::<ModelList, _>(&self.config.id, |client| self.authorized(client.get(&url)))
            .await
        {
            Ok(list) if !list.data.is_empty() => {
                let mut models: Vec<String> = list
                    .data
                    .into_iter()
                    .map(|m| m.id)
                    .filter(|id| id.starts_with("gpt-") || id.starts_with('o'))
                    .collect();
                models.sort();
                models
            }
            Ok(_) => self.capabilities().models,
            Err(failure) => {
                debug!(error = %failure, "Model catalogue unavailable, using built-in list");
                self.capabilities().models
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendKind, NewBackend};
    use serde_json::json;

    fn sampling() -> Sampling {
        Sampling {
            temperature: 0.7,
            max_tokens: 4096,
            top_p: None,
        }
    }

    #[test]
    fn test_build_text_request() {
        let request = GenerateRequest::new("Plan a lesson on fractions");
        let chat = build_chat_request("gpt-4o-mini", sampling(), &request);

        assert_eq!(chat.model, "gpt-4o-mini");
        assert_eq!(chat.messages.len(), 1);
        assert_eq!(chat.messages[0].role, "user");
        assert!(chat.response_format.is_none());
        assert_eq!(chat.temperature, 0.7);
        assert_eq!(chat.max_tokens, 4096);
    }

    #[test]
    fn test_build_json_request_with_overrides() {
        let request = GenerateRequest::new("Quiz")
            .json()
            .with_temperature(0.1)
            .with_max_tokens(300);
        let chat = build_chat_request("gpt-4o", sampling(), &request);

        assert_eq!(chat.messages[0].role, "system");
        assert_eq!(chat.messages[1].content, "Quiz");
        assert_eq!(
            chat.response_format,
            Some(ChatResponseFormat {
                r#type: "json_object".to_string()
            })
        );
        assert_eq!(chat.temperature, 0.1);
        assert_eq!(chat.max_tokens, 300);

        let wire = serde_json::to_value(&chat).unwrap();
        assert_eq!(wire["response_format"]["type"], "json_object");
        assert!(wire.get("stream").is_none());
    }

    #[test]
    fn test_parse_response() {
        let response: ChatResponse = serde_json::from_value(json!({
            "model": "gpt-4o-mini-2024-07-18",
            "choices": [{"message": {"role": "assistant", "content": "{\"a\": 1}"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 5, "total_tokens": 17}
        }))
        .unwrap();

        let result = parse_chat_response(response, ResponseFormat::Json, "b1", "gpt-4o-mini");
        let GenerateResult::Success(success) = result else {
            panic!("expected success");
        };
        assert_eq!(success.content, json!({"a": 1}));
        assert_eq!(success.usage.unwrap().total_tokens, 17);
        assert_eq!(success.model, "gpt-4o-mini-2024-07-18");
        assert_eq!(success.backend_id, "b1");
    }

    #[test]
    fn test_parse_response_missing_total_saturates() {
        let response: ChatResponse = serde_json::from_value(json!({
            "choices": [{"message": {"role": "assistant", "content": "ok"}}],
            "usage": {"prompt_tokens": u32::MAX, "completion_tokens": 1, "total_tokens": 0}
        }))
        .unwrap();

        let result = parse_chat_response(response, ResponseFormat::Text, "b1", "gpt-4o-mini");
        let usage = result.usage().unwrap();
        assert_eq!(usage.total_tokens, u32::MAX);
        assert_eq!(usage.completion_tokens, 1);
    }

    #[test]
    fn test_parse_response_without_choices() {
        let response: ChatResponse = serde_json::from_value(json!({"choices": []})).unwrap();
        let result = parse_chat_response(response, ResponseFormat::Text, "b1", "m");
        let failure = result.failure().unwrap();
        assert_eq!(failure.error_kind, ErrorKind::ParsingError);
    }

    #[test]
    fn test_rejects_foreign_tuning() {
        let config = NewBackend::new("x", BackendKind::Gemini, "key-0123456789").into_config();
        assert!(OpenAiBackend::new(config, AdapterOptions::default()).is_err());
    }

    #[test]
    fn test_capabilities() {
        let config = NewBackend::new("x", BackendKind::OpenAi, "key-0123456789").into_config();
        let backend = OpenAiBackend::new(config, AdapterOptions::default()).unwrap();
        let caps = backend.capabilities();
        assert!(caps.response_formats.contains(&ResponseFormat::Json));
        assert!(caps.models.contains(&DEFAULT_MODEL.to_string()));
    }
}
