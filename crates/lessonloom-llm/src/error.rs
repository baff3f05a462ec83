//! Error types for lessonloom-llm
//!
//! Content generation never fails with these: it reports a tagged
//! [`Failure`](crate::failure::Failure) instead. These errors cover backend
//! management and persistence.

use crate::failure::Failure;
use thiserror::Error;

/// LLM error type
#[derive(Debug, Error)]
pub enum Error {
    /// No backend with the given id
    #[error("backend not found: {0}")]
    NotFound(String),

    /// A backend with the same id already exists
    #[error("backend already exists: {0}")]
    Duplicate(String),

    /// Configuration rejected before reaching the network
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Connectivity probe failed; the change was not committed
    #[error("connection test failed: {0}")]
    Probe(Failure),

    /// Persistence backend error
    #[error("storage error: {0}")]
    Storage(String),

    /// Persisted state could not be (de)serialized
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
