//! Gemini - Google generateContent API adapter

use super::http::{base_url, HttpTransport};
use crate::backend::{AdapterOptions, Backend, BackendConfig, Capabilities, GeminiTuning, Tuning};
use crate::error::{Error, Result};
use crate::failure::{ErrorKind, Failure};
use crate::request::{GenerateRequest, GenerateResult, GenerateSuccess, ResponseFormat, TokenUsage};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// Gemini API base URL
pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Built-in Gemini model catalogue
pub const MODELS: &[&str] = &[
    "gemini-2.5-flash",
    "gemini-2.5-flash-lite",
    "gemini-2.5-pro",
    "gemini-2.0-flash",
];

/// Default Gemini model
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
}

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    model_version: Option<String>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<GeminiContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiModelList {
    #[serde(default)]
    models: Vec<GeminiModelEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiModelEntry {
    name: String,
    #[serde(default)]
    supported_generation_methods: Vec<String>,
}

fn build_request(tuning: &GeminiTuning, request: &GenerateRequest) -> GeminiRequest {
    let response_mime_type = match request.response_format {
        ResponseFormat::Json => Some("application/json".to_string()),
        ResponseFormat::Text => None,
    };

    GeminiRequest {
        contents: vec![GeminiContent {
            role: Some("user".to_string()),
            parts: vec![GeminiPart {
                text: Some(request.prompt.clone()),
            }],
        }],
        generation_config: GenerationConfig {
            temperature: request.temperature.unwrap_or(tuning.temperature),
            max_output_tokens: request.max_tokens.unwrap_or(tuning.max_output_tokens),
            top_p: tuning.top_p,
            top_k: tuning.top_k,
            response_mime_type,
        },
    }
}

fn parse_response(
    response: GeminiResponse,
    format: ResponseFormat,
    backend_id: &str,
    requested_model: &str,
) -> GenerateResult {
    if let Some(reason) = response
        .prompt_feedback
        .as_ref()
        .and_then(|f| f.block_reason.as_deref())
    {
        return Failure::new(
            ErrorKind::Unknown,
            format!("prompt blocked by provider: {}", reason),
            backend_id,
        )
        .into();
    }

    let Some(candidate) = response.candidates.into_iter().next() else {
        return Failure::new(ErrorKind::ParsingError, "no candidates in response", backend_id)
            .into();
    };

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.is_empty() && candidate.finish_reason.as_deref() == Some("SAFETY") {
        return Failure::new(
            ErrorKind::Unknown,
            "response blocked by safety filters",
            backend_id,
        )
        .into();
    }

    let usage = response.usage_metadata.map(|u| {
        let mut usage = TokenUsage::new(u.prompt_token_count, u.candidates_token_count);
        if u.total_token_count != 0 {
            usage.total_tokens = u.total_token_count;
        }
        usage
    });

    GenerateResult::Success(GenerateSuccess::from_text(
        text,
        format,
        usage,
        backend_id,
        response
            .model_version
            .unwrap_or_else(|| requested_model.to_string()),
    ))
}

// ============================================================================
// Adapter
// ============================================================================

/// Google Gemini adapter
pub struct GeminiBackend {
    config: BackendConfig,
    tuning: GeminiTuning,
    transport: HttpTransport,
    base_url: String,
}

impl GeminiBackend {
    /// Create an adapter for a Gemini config
    pub fn new(config: BackendConfig, options: AdapterOptions) -> Result<Self> {
        let Tuning::Gemini(tuning) = config.tuning.clone() else {
            return Err(Error::InvalidConfig(format!(
                "backend {} is not a Gemini config",
                config.id
            )));
        };
        let base_url = base_url(tuning.base_url.as_deref(), GEMINI_API_BASE);

        Ok(Self {
            transport: HttpTransport::new(options)?,
            config,
            tuning,
            base_url,
        })
    }

    // The key travels in a header so it never shows up in URLs echoed by
    // transport errors.
    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder.header("x-goog-api-key", self.config.credential.expose())
    }
}

#[async_trait::async_trait]
impl Backend for GeminiBackend {
    fn config(&self) -> &BackendConfig {
        &self.config
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            response_formats: vec![ResponseFormat::Json, ResponseFormat::Text],
            vision: true,
            function_calling: true,
            max_context_tokens: 1_048_576,
            models: MODELS.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    #[instrument(skip(self, request), fields(backend = %self.config.id))]
    async fn generate(&self, request: &GenerateRequest) -> GenerateResult {
        let model = request.model_or(&self.config.model);
        let body = build_request(&self.tuning, request);

        debug!(model = %model, "Sending request to Gemini");

        let url = format!("{}/models/{}:generateContent", self.base_url, model);
        match self
            .transport
            .send_json::<GeminiResponse, _>(&self.config.id, |client| {
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
        let url = format!("{}/models", self.base_url);
        match self
            .transport
            .send_json::<GeminiModelList, _>(&self.config.id, |client| {
                self.authorized(client.get(&url))
            })
            .await
        {
            Ok(list) if !list.models.is_empty() => list
                .models
                .into_iter()
                .filter(|m| {
                    m.supported_generation_methods
                        .iter()
                        .any(|method| method == "generateContent")
                })
                .map(|m| m.name.trim_start_matches("models/").to_string())
                .collect(),
            Ok(_) => self.capabilities().models,
            Err(failure) => {
                debug!(error = %failure, "Model catalogue unavailable, using built-in list");
                self.capabilities().models
            }
        }
    }
}
