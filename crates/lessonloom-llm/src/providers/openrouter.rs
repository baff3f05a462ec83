//! OpenRouter - Multi-provider gateway
//!
//! OpenAI-compatible API; adds the optional attribution headers
//! (`HTTP-Referer`, `X-Title`).

use super::http::{base_url, HttpTransport};
use super::openai::{build_chat_request, parse_chat_response, ChatResponse, ModelList, Sampling};
use crate::backend::{
    AdapterOptions, Backend, BackendConfig, Capabilities, OpenRouterTuning, Tuning,
};
use crate::error::{Error, Result};
use crate::request::{GenerateRequest, GenerateResult, ResponseFormat};
use tracing::{debug, instrument};

/// OpenRouter API base URL
pub const OPENROUTER_API_BASE: &str = "https://openrouter.ai/api/v1";

/// Built-in OpenRouter model catalogue
pub const MODELS: &[&str] = &[
    "openai/gpt-4o-mini",
    "openai/gpt-4o",
    "anthropic/claude-3.5-sonnet",
    "google/gemini-2.0-flash-001",
    "meta-llama/llama-3.3-70b-instruct",
    "deepseek/deepseek-chat",
];

/// Default OpenRouter model
pub const DEFAULT_MODEL: &str = "openai/gpt-4o-mini";

/// OpenRouter adapter
pub struct OpenRouterBackend {
    config: BackendConfig,
    tuning: OpenRouterTuning,
    transport: HttpTransport,
    base_url: String,
}

impl OpenRouterBackend {
    /// Create an adapter for an OpenRouter config
    pub fn new(config: BackendConfig, options: AdapterOptions) -> Result<Self> {
        let Tuning::OpenRouter(tuning) = config.tuning.clone() else {
            return Err(Error::InvalidConfig(format!(
                "backend {} is not an OpenRouter config",
                config.id
            )));
        };
        let base_url = base_url(tuning.base_url.as_deref(), OPENROUTER_API_BASE);

        Ok(Self {
            transport: HttpTransport::new(options)?,
            config,
            tuning,
            base_url,
        })
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let mut builder = builder.bearer_auth(self.config.credential.expose());
        if let Some(site) = &self.tuning.site_url {
            builder = builder.header("HTTP-Referer", site);
        }
        if let Some(app) = &self.tuning.app_name {
            builder = builder.header("X-Title", app);
        }
        builder
    }
}

#[async_trait::async_trait]
impl Backend for OpenRouterBackend {
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
        let chat_request = build_chat_request(
            model,
            Sampling {
                temperature: self.tuning.temperature,
                max_tokens: self.tuning.max_tokens,
                top_p: self.tuning.top_p,
            },
            request,
        );

        debug!(model = %model, "Sending request to OpenRouter");

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
            Ok(list) if !list.data.is_empty() => list.data.into_iter().map(|m| m.id).collect(),
            Ok(_) => self.capabilities().models,
            Err(failure) => {
                debug!(error = %failure, "Model catalogue unavailable, using built-in list");
                self.capabilities().models
            }
        }
    }
}
