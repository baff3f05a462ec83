//! Lessonloom LLM - AI backend abstraction and routing
//!
//! This crate provides the routing layer that sits between lesson-plan
//! features and the hosted model APIs:
//! - Backend: adapter trait and per-kind configuration (OpenAI, Anthropic,
//!   Gemini, OpenRouter)
//! - Router: policy-driven backend selection with a bounded fallback
//! - Usage: rolling per-backend statistics (counts, latency, tokens)
//! - Store: backend configuration store and key-value persistence

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod backend;
pub mod error;
pub mod failure;
pub mod json;
pub mod providers;
pub mod request;
pub mod router;
pub mod secret;
pub mod store;
pub mod usage;
pub mod util;

pub use backend::{
    AdapterOptions, Backend, BackendConfig, BackendFactory, BackendKind, BackendUpdate,
    Capabilities, HttpBackendFactory, NewBackend, Tuning,
};
pub use error::{Error, Result};
pub use failure::{ErrorKind, Failure};
pub use request::{GenerateRequest, GenerateResult, GenerateSuccess, ResponseFormat, TokenUsage};
pub use router::{
    MockBackend, MockBackendFactory, MockReply, Router, RouterSettings, SelectionPolicy, TestResult,
};
pub use secret::SecureString;
pub use store::{ConfigStore, FileKvStore, KeyValueStore, MemoryKvStore};
pub use usage::{UsageStat, UsageTracker};

// Re-export provider adapters
pub use providers::anthropic::AnthropicBackend;
pub use providers::gemini::GeminiBackend;
pub use providers::openai::OpenAiBackend;
pub use providers::openrouter::OpenRouterBackend;
