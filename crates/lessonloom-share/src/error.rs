//! Error types for lessonloom-share

use thiserror::Error;

/// Share error type
#[derive(Debug, Error)]
pub enum ShareError {
    /// Decryption failed; deliberately says nothing about which step
    #[error("wrong passphrase or corrupted data")]
    DecryptionFailed,

    /// Encryption failed
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    /// Bundle envelope is unusable (bad version, inconsistent metadata)
    #[error("invalid share bundle: {0}")]
    InvalidBundle(String),

    /// Passphrase too weak to protect credentials
    #[error("passphrase too weak: {}", .0.join("; "))]
    WeakPassphrase(Vec<String>),

    /// Decoded payload failed structural validation
    #[error("share data is invalid: {}", .0.join("; "))]
    Validation(Vec<String>),

    /// No bundle with the given id
    #[error("share not found: {0}")]
    NotFound(String),

    /// Blob store error
    #[error("storage error: {0}")]
    Storage(String),

    /// Envelope could not be (de)serialized
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Importing into the router failed
    #[error("import failed: {0}")]
    Import(#[from] lessonloom_llm::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, ShareError>;
