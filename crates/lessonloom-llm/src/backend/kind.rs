//! Backend kinds and their kind-specific tuning

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported backend kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// OpenAI chat completions
    OpenAi,
    /// Anthropic messages API
    Anthropic,
    /// Google Gemini generateContent API
    Gemini,
    /// OpenRouter (OpenAI-compatible gateway)
    OpenRouter,
}

impl BackendKind {
    /// All kinds, in display order
    pub const ALL: [BackendKind; 4] = [
        BackendKind::OpenAi,
        BackendKind::Anthropic,
        BackendKind::Gemini,
        BackendKind::OpenRouter,
    ];

    /// Returns the string representation
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Gemini => "gemini",
            Self::OpenRouter => "openrouter",
        }
    }

    /// Human-readable provider name
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Self::OpenAi => "OpenAI",
            Self::Anthropic => "Anthropic Claude",
            Self::Gemini => "Google Gemini",
            Self::OpenRouter => "OpenRouter",
        }
    }

    /// Model used when none is configured
    #[must_use]
    pub fn default_model(self) -> &'static str {
        match self {
            Self::OpenAi => crate::providers::openai::DEFAULT_MODEL,
            Self::Anthropic => crate::providers::anthropic::DEFAULT_MODEL,
            Self::Gemini => crate::providers::gemini::DEFAULT_MODEL,
            Self::OpenRouter => crate::providers::openrouter::DEFAULT_MODEL,
        }
    }

    /// Environment variable holding an API key for this kind
    #[must_use]
    pub fn api_key_env(self) -> &'static str {
        match self {
            Self::OpenAi => "OPENAI_API_KEY",
            Self::Anthropic => "ANTHROPIC_API_KEY",
            Self::Gemini => "GEMINI_API_KEY",
            Self::OpenRouter => "OPENROUTER_API_KEY",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "anthropic" | "claude" => Ok(Self::Anthropic),
            "gemini" | "google" => Ok(Self::Gemini),
            "openrouter" => Ok(Self::OpenRouter),
            other => Err(format!("unknown backend kind: {}", other)),
        }
    }
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    4096
}

/// OpenAI sampling and endpoint settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenAiTuning {
    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Output token budget
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Nucleus sampling
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    /// Base URL override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Organization header
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
}

impl Default for OpenAiTuning {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            top_p: None,
            base_url: None,
            organization: None,
        }
    }
}

/// Anthropic sampling and endpoint settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnthropicTuning {
    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Output token budget (required by the API)
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Nucleus sampling
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    /// Top-k sampling
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    /// Base URL override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl Default for AnthropicTuning {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            top_p: None,
            top_k: None,
            base_url: None,
        }
    }
}

/// Gemini generation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiTuning {
    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Output token budget
    #[serde(default = "default_max_tokens")]
    pub max_output_tokens: u32,
    /// Nucleus sampling
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    /// Top-k sampling
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    /// Base URL override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl Default for GeminiTuning {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            max_output_tokens: default_max_tokens(),
            top_p: None,
            top_k: None,
            base_url: None,
        }
    }
}

/// OpenRouter sampling and attribution settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenRouterTuning {
    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Output token budget
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Nucleus sampling
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    /// Sent as `HTTP-Referer`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_url: Option<String>,
    /// Sent as `X-Title`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_name: Option<String>,
    /// Base URL override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl Default for OpenRouterTuning {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            top_p: None,
            site_url: None,
            app_name: None,
            base_url: None,
        }
    }
}

/// Kind-specific tuning, one variant per [`BackendKind`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tuning {
    /// OpenAI settings
    OpenAi(OpenAiTuning),
    /// Anthropic settings
    Anthropic(AnthropicTuning),
    /// Gemini settings
    Gemini(GeminiTuning),
    /// OpenRouter settings
    OpenRouter(OpenRouterTuning),
}

impl Tuning {
    /// Default tuning for a kind
    #[must_use]
    pub fn default_for(kind: BackendKind) -> Self {
        match kind {
            BackendKind::OpenAi => Self::OpenAi(OpenAiTuning::default()),
            BackendKind::Anthropic => Self::Anthropic(AnthropicTuning::default()),
            BackendKind::Gemini => Self::Gemini(GeminiTuning::default()),
            BackendKind::OpenRouter => Self::OpenRouter(OpenRouterTuning::default()),
        }
    }

    /// Kind this tuning belongs to
    #[must_use]
    pub fn kind(&self) -> BackendKind {
        match self {
            Self::OpenAi(_) => BackendKind::OpenAi,
            Self::Anthropic(_) => BackendKind::Anthropic,
            Self::Gemini(_) => BackendKind::Gemini,
            Self::OpenRouter(_) => BackendKind::OpenRouter,
        }
    }

    /// Configured temperature
    #[must_use]
    pub fn temperature(&self) -> f32 {
        match self {
            Self::OpenAi(t) => t.temperature,
            Self::Anthropic(t) => t.temperature,
            Self::Gemini(t) => t.temperature,
            Self::OpenRouter(t) => t.temperature,
        }
    }

    /// Configured output token budget
    #[must_use]
    pub fn max_tokens(&self) -> u32 {
        match self {
            Self::OpenAi(t) => t.max_tokens,
            Self::Anthropic(t) => t.max_tokens,
            Self::Gemini(t) => t.max_output_tokens,
            Self::OpenRouter(t) => t.max_tokens,
        }
    }

    /// Range checks shared by all kinds
    pub fn validate(&self) -> std::result::Result<(), String> {
        let temperature = self.temperature();
        if !(0.0..=2.0).contains(&temperature) {
            return Err(format!(
                "temperature must be between 0.0 and 2.0, got {}",
                temperature
            ));
        }
        if self.max_tokens() == 0 {
            return Err("max tokens must be greater than zero".to_string());
        }
        Ok(())
    }
}
