//! Provider adapters
//!
//! One module per [`BackendKind`](crate::backend::BackendKind). The shared
//! transport lives in `http`.

pub mod anthropic;
pub mod gemini;
pub(crate) mod http;
pub mod openai;
pub mod openrouter;
