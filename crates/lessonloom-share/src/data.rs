//! Share payloads and the bundle envelope
//!
//! [`ShareData`] is the plaintext that gets encrypted; it carries raw
//! credentials and must never be logged. [`ShareBundle`] is what the blob
//! store holds: ciphertext plus metadata a recipient can read without the
//! passphrase.

use chrono::{DateTime, Utc};
use lessonloom_llm::{BackendConfig, BackendKind, NewBackend, SecureString, Tuning};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Envelope format version
pub const BUNDLE_VERSION: u32 = 1;

/// One backend inside a share payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedBackend {
    /// Provider kind
    pub kind: BackendKind,
    /// Display name
    pub name: String,
    /// Configured model
    pub model: String,
    /// API key
    pub credential: SecureString,
    /// Kind-specific tuning
    pub tuning: Tuning,
    /// Free-form note from the sharer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl From<&BackendConfig> for SharedBackend {
    fn from(config: &BackendConfig) -> Self {
        Self {
            kind: config.kind,
            name: config.name.clone(),
            model: config.model.clone(),
            credential: config.credential.clone(),
            tuning: config.tuning.clone(),
            description: None,
        }
    }
}

/// Plaintext share payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareData {
    /// Shared backends
    pub backends: Vec<SharedBackend>,
    /// When the payload was assembled
    pub shared_at: DateTime<Utc>,
}

impl ShareData {
    /// Build a payload from stored configs
    #[must_use]
    pub fn from_configs<'a>(configs: impl IntoIterator<Item = &'a BackendConfig>) -> Self {
        Self {
            backends: configs.into_iter().map(SharedBackend::from).collect(),
            shared_at: Utc::now(),
        }
    }

    /// Structural problems, empty when the payload is importable
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.backends.is_empty() {
            errors.push("share contains no backends".to_string());
        }
        for (i, backend) in self.backends.iter().enumerate() {
            let label = format!("backend #{}", i + 1);
            if backend.name.trim().is_empty() {
                errors.push(format!("{}: name is empty", label));
            }
            if backend.credential.is_blank() {
                errors.push(format!("{}: credential is empty", label));
            }
            if backend.model.trim().is_empty() {
                errors.push(format!("{}: model is empty", label));
            }
            if backend.tuning.kind() != backend.kind {
                errors.push(format!(
                    "{}: tuning for {} does not match kind {}",
                    label,
                    backend.tuning.kind(),
                    backend.kind
                ));
            }
        }
        errors
    }

    /// Kinds present in the payload
    #[must_use]
    pub fn kinds(&self) -> BTreeSet<BackendKind> {
        self.backends.iter().map(|b| b.kind).collect()
    }

    /// Convert into router inputs; ids are assigned on add
    #[must_use]
    pub fn into_new_backends(self) -> Vec<NewBackend> {
        self.backends
            .into_iter()
            .map(|b| {
                NewBackend::new(b.name, b.kind, b.credential)
                    .with_model(b.model)
                    .with_tuning(b.tuning)
            })
            .collect()
    }
}

/// Plaintext metadata stored next to the ciphertext
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleMetadata {
    /// Envelope format version
    pub version: u32,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Kinds present in the payload
    pub backend_kinds: BTreeSet<BackendKind>,
    /// Number of backends in the payload
    pub backend_count: usize,
    /// Always true for bundles produced here
    pub encrypted: bool,
}

impl BundleMetadata {
    /// Metadata describing `data`
    #[must_use]
    pub fn describe(data: &ShareData) -> Self {
        Self {
            version: BUNDLE_VERSION,
            created_at: Utc::now(),
            backend_kinds: data.kinds(),
            backend_count: data.backends.len(),
            encrypted: true,
        }
    }
}

/// An encrypted share as stored in the blob store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareBundle {
    /// Opaque share id
    pub id: String,
    /// Human-chosen name
    pub name: String,
    /// Optional description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Base64 of `salt || nonce || ciphertext`
    pub ciphertext: String,
    /// Readable without the passphrase
    pub metadata: BundleMetadata,
}

/// What a recipient sees before entering the passphrase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharePreview {
    /// Share id
    pub id: String,
    /// Share name
    pub name: String,
    /// Optional description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Bundle metadata
    pub metadata: BundleMetadata,
}

impl From<&ShareBundle> for SharePreview {
    fn from(bundle: &ShareBundle) -> Self {
        Self {
            id: bundle.id.clone(),
            name: bundle.name.clone(),
            description: bundle.description.clone(),
            metadata: bundle.metadata.clone(),
        }
    }
}
