//! Anthropic - Claude Messages API adapter
//!
//! The Messages API has no JSON mode, so JSON requests carry a system
//! instruction and rely on lenient parsing of the reply.

use super::http::{base_url, HttpTransport};
use super::openai::{ModelList, JSON_INSTRUCTION};
use crate::backend::{
    AdapterOptions, AnthropicTuning, Backend, BackendConfig, Capabilities, Tuning,
};
use crate::error::{Error, Result};
use crate::failure::{ErrorKind, Failure};
use crate::request::{GenerateRequest, GenerateResult, GenerateSuccess, ResponseFormat, TokenUsage};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// Anthropic API version
const API_VERSION: &str = "2023-06-01";

/// Default API base URL
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

/// Built-in Claude model catalogue
pub const MODELS: &[&str] = &[
    "claude-sonnet-4-5-20250929",
    "claude-haiku-4-5-20251001",
    "claude-opus-4-1-20250805",
    "claude-3-5-haiku-20241022",
];

/// Default Claude model
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-5-20250929";

// ============================================================================
// API Types
// ============================================================================

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<MessagesMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<u32>,
}

#[derive(Debug, Serialize)]
struct MessagesMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    content: Vec<ResponseContentBlock>,
    #[serde(default)]
    usage: Option<MessagesUsage>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ResponseContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct MessagesUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

fn build_request(
    model: &str,
    tuning: &AnthropicTuning,
    request: &GenerateRequest,
) -> MessagesRequest {
    let system = match request.response_format {
        ResponseFormat::Json => Some(JSON_INSTRUCTION.to_string()),
        ResponseFormat::Text => None,
    };

    MessagesRequest {
        model: model.to_string(),
        max_tokens: request.max_tokens.unwrap_or(tuning.max_tokens),
        system,
        messages: vec![MessagesMessage {
            role: "user".to_string(),
            content: request.prompt.clone(),
        }],
        temperature: request.temperature.unwrap_or(tuning.temperature).min(1.0),
        top_p: tuning.top_p,
        top_k: tuning.top_k,
    }
}

fn parse_response(
    response: MessagesResponse,
    format: ResponseFormat,
    backend_id: &str,
    requested_model: &str,
) -> GenerateResult {
    let text = response
        .content
        .iter()
        .filter_map(|block| match block {
            ResponseContentBlock::Text { text } => Some(text.as_str()),
            ResponseContentBlock::Other => None,
        })
        .collect::<Vec<_>>()
        .join("");

    if response.content.is_empty() {
        return Failure::new(
            ErrorKind::ParsingError,
            "no content blocks in response",
            backend_id,
        )
        .into();
    }

    let usage = response
        .usage
        .map(|u| TokenUsage::new(u.input_tokens, u.output_tokens));

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

/// Anthropic Claude adapter
pub struct AnthropicBackend {
    config: BackendConfig,
    tuning: AnthropicTuning,
    transport: HttpTransport,
    base_url: String,
}

impl AnthropicBackend {
    /// Create an adapter for an Anthropic config
    pub fn new(config: BackendConfig, options: AdapterOptions) -> Result<Self> {
        let Tuning::Anthropic(tuning) = config.tuning.clone() else {
            return Err(Error::InvalidConfig(format!(
                "backend {} is not an Anthropic config",
                config.id
            )));
        };
        let base_url = base_url(tuning.base_url.as_deref(), DEFAULT_BASE_URL);

        Ok(Self {
            transport: HttpTransport::new(options)?,
            config,
            tuning,
            base_url,
        })
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header("x-api-key", self.config.credential.expose())
            .header("anthropic-version", API_VERSION)
    }
}

#[async_trait::async_trait]
impl Backend for AnthropicBackend {
    fn config(&self) -> &BackendConfig {
        &self.config
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            response_formats: vec![ResponseFormat::Json, ResponseFormat::Text],
            vision: true,
            function_calling: true,
            max_context_tokens: 200_000,
            models: MODELS.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    #[instrument(skip(self, request), fields(backend = %self.config.id))]
    async fn generate(&self, request: &GenerateRequest) -> GenerateResult {
        let model = request.model_or(&self.config.model);
        let body = build_request(model, &self.tuning, request);

        debug!(model = %model, "Sending request to Anthropic");

        let url = format!("{}/v1/messages", self.base_url);
        match self
            .transport
            .send_json::<MessagesResponse, _>(&self.config.id, |client| {
                self.authorized(client.post(&url)).json(&body)
            })
            .await
        {
            Ok(response) => {
                parse_response(response, request.response_format, &self.config.id, model)
            }
            Err(failure) => failure.into(),
        }
    }

    async fn list_models(&self) -> Vec<String> {
        let url = format!("{}/v1/models", self.base_url);
        match self
            .transport
            .send_json::<ModelList, _>(&self.config.id, |client| self.authorized(client.get(&url)))
            .await
        {
            Ok(list) if !list.data.is_empty() => list.data.into_iter().map(|m| m.id).collect(),
            Ok(_) => self.capabilities().models,
            Err(failure) => {
                debug!(error = %failure, "Model catalogue unavailable, using built-in list");
                self.capabilities().models
            }
        }
    }
}
