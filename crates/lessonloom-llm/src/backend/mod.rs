//! Backend adapter abstraction
//!
//! Every provider kind implements [`Backend`]: it translates a
//! [`GenerateRequest`] into a provider call and the response back into a
//! [`GenerateResult`]. Adapters hold nothing but their own config and HTTP
//! client.
//!
//! # Module Structure
//!
//! - `kind`: `BackendKind` and the per-kind `Tuning` union
//! - `config`: `BackendConfig`, `NewBackend`, `BackendUpdate`

mod config;
mod kind;

pub use config::{BackendConfig, BackendUpdate, NewBackend};
pub use kind::{
    AnthropicTuning, BackendKind, GeminiTuning, OpenAiTuning, OpenRouterTuning, Tuning,
};

use crate::error::Result;
use crate::failure::{ErrorKind, Failure};
use crate::request::{GenerateRequest, GenerateResult, ResponseFormat};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Prompt used by connectivity probes
pub const PROBE_PROMPT: &str = "Reply with OK.";

/// Token budget for connectivity probes
pub const PROBE_MAX_TOKENS: u32 = 16;

/// Static description of what a backend can do
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    /// Supported response formats
    pub response_formats: Vec<ResponseFormat>,
    /// Accepts image input
    pub vision: bool,
    /// Supports function/tool calling
    pub function_calling: bool,
    /// Largest context window among catalogue models
    pub max_context_tokens: u32,
    /// Built-in model catalogue
    pub models: Vec<String>,
}

/// Trait for backend adapters
#[async_trait::async_trait]
pub trait Backend: Send + Sync {
    /// Config this adapter was built from
    fn config(&self) -> &BackendConfig;

    /// Static capability metadata
    fn capabilities(&self) -> Capabilities;

    /// Generate content; never panics or returns transport errors
    async fn generate(&self, request: &GenerateRequest) -> GenerateResult;

    /// Live model catalogue, or the built-in list when unreachable
    async fn list_models(&self) -> Vec<String>;

    /// Backend id
    fn id(&self) -> &str {
        &self.config().id
    }

    /// Send a minimal request and require a well-formed reply
    async fn test_connection(&self) -> std::result::Result<(), Failure> {
        let probe = GenerateRequest::new(PROBE_PROMPT).with_max_tokens(PROBE_MAX_TOKENS);
        match self.generate(&probe).await {
            GenerateResult::Success(success) if success.content.is_string() => Ok(()),
            GenerateResult::Success(_) => Err(Failure::new(
                ErrorKind::ParsingError,
                "probe returned an unexpected payload",
                self.id(),
            )),
            GenerateResult::Failure(failure) => Err(failure),
        }
    }
}

/// Transport options shared by all adapters built by a factory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdapterOptions {
    /// Upper bound for one HTTP exchange
    pub timeout: Duration,
    /// Extra attempts after a connection-level failure
    pub retry_attempts: u32,
}

impl Default for AdapterOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            retry_attempts: 0,
        }
    }
}

/// Builds adapters from configs
///
/// The router rebuilds adapters through this trait whenever a config or
/// the transport settings change, which also lets tests inject fakes.
pub trait BackendFactory: Send + Sync {
    /// Build an adapter for `config`
    fn build(&self, config: &BackendConfig, options: AdapterOptions) -> Result<Arc<dyn Backend>>;
}

/// Factory producing the real HTTP adapters
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpBackendFactory;

impl BackendFactory for HttpBackendFactory {
    fn build(&self, config: &BackendConfig, options: AdapterOptions) -> Result<Arc<dyn Backend>> {
        use crate::providers::{
            anthropic::AnthropicBackend, gemini::GeminiBackend, openai::OpenAiBackend,
            openrouter::OpenRouterBackend,
        };

        let backend: Arc<dyn Backend> = match config.kind {
            BackendKind::OpenAi => Arc::new(OpenAiBackend::new(config.clone(), options)?),
            BackendKind::Anthropic => Arc::new(AnthropicBackend::new(config.clone(), options)?),
            BackendKind::Gemini => Arc::new(GeminiBackend::new(config.clone(), options)?),
            BackendKind::OpenRouter => Arc::new(OpenRouterBackend::new(config.clone(), options)?),
        };
        Ok(backend)
    }
}
