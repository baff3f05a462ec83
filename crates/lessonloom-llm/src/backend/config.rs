//! Backend configuration records
//!
//! `id` and `kind` are fixed at creation; everything else may change
//! through [`BackendUpdate`].

use super::kind::{BackendKind, Tuning};
use crate::error::{Error, Result};
use crate::secret::SecureString;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A configured backend
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendConfig {
    /// Unique id within the config store
    pub id: String,
    /// Display name
    pub name: String,
    /// Provider kind
    pub kind: BackendKind,
    /// Whether the router may select this backend
    pub enabled: bool,
    /// API key
    pub credential: SecureString,
    /// Model used unless a request overrides it
    pub model: String,
    /// Kind-specific tuning
    pub tuning: Tuning,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
}

// SECURITY: Custom Debug implementation to mask the credential
impl fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendConfig")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("enabled", &self.enabled)
            .field("credential", &self.credential.masked())
            .field("model", &self.model)
            .field("tuning", &self.tuning)
            .finish()
    }
}

impl BackendConfig {
    /// Whether the router may pick this backend
    ///
    /// Disabled and credential-less configs are never selectable.
    #[must_use]
    pub fn is_selectable(&self) -> bool {
        self.enabled && !self.credential.is_blank()
    }

    /// Structural checks run before a config is stored
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(Error::InvalidConfig("backend id is empty".to_string()));
        }
        if self.name.trim().is_empty() {
            return Err(Error::InvalidConfig("backend name is empty".to_string()));
        }
        if self.model.trim().is_empty() {
            return Err(Error::InvalidConfig(format!(
                "backend {} has no model",
                self.id
            )));
        }
        if self.tuning.kind() != self.kind {
            return Err(Error::InvalidConfig(format!(
                "tuning for {} does not match backend kind {}",
                self.tuning.kind(),
                self.kind
            )));
        }
        if self.enabled && self.credential.is_blank() {
            return Err(Error::InvalidConfig(format!(
                "backend {} is enabled but has no credential",
                self.id
            )));
        }
        self.tuning.validate().map_err(Error::InvalidConfig)
    }

    /// Apply a partial update, bumping `updated_at`
    #[must_use]
    pub fn updated(&self, update: &BackendUpdate) -> Self {
        let mut next = self.clone();
        if let Some(name) = &update.name {
            next.name = name.clone();
        }
        if let Some(credential) = &update.credential {
            next.credential = credential.clone();
        }
        if let Some(model) = &update.model {
            next.model = model.clone();
        }
        if let Some(tuning) = &update.tuning {
            next.tuning = tuning.clone();
        }
        if let Some(enabled) = update.enabled {
            next.enabled = enabled;
        }
        next.updated_at = Utc::now();
        next
    }
}

/// Input for creating a backend
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBackend {
    /// Display name
    pub name: String,
    /// Provider kind
    pub kind: BackendKind,
    /// API key
    pub credential: SecureString,
    /// Model; the kind's default when `None`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Tuning; the kind's default when `None`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tuning: Option<Tuning>,
    /// Whether the backend starts enabled
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl fmt::Debug for NewBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewBackend")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("credential", &self.credential.masked())
            .field("model", &self.model)
            .field("enabled", &self.enabled)
            .finish()
    }
}

impl NewBackend {
    /// Create an enabled backend with default model and tuning
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        kind: BackendKind,
        credential: impl Into<SecureString>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            credential: credential.into(),
            model: None,
            tuning: None,
            enabled: true,
        }
    }

    /// Set the model
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the tuning
    #[must_use]
    pub fn with_tuning(mut self, tuning: Tuning) -> Self {
        self.tuning = Some(tuning);
        self
    }

    /// Set the enabled flag
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Materialize into a config with a fresh id
    #[must_use]
    pub fn into_config(self) -> BackendConfig {
        let now = Utc::now();
        BackendConfig {
            id: uuid::Uuid::new_v4().to_string(),
            name: self.name,
            kind: self.kind,
            enabled: self.enabled,
            credential: self.credential,
            model: self
                .model
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| self.kind.default_model().to_string()),
            tuning: self.tuning.unwrap_or_else(|| Tuning::default_for(self.kind)),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update of a backend; `None` leaves a field unchanged
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendUpdate {
    /// New display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// New credential
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<SecureString>,
    /// New model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// New tuning (must match the backend kind)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tuning: Option<Tuning>,
    /// New enabled flag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

impl fmt::Debug for BackendUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendUpdate")
            .field("name", &self.name)
            .field("credential", &self.credential.as_ref().map(|c| c.masked()))
            .field("model", &self.model)
            .field("tuning", &self.tuning)
            .field("enabled", &self.enabled)
            .finish()
    }
}

impl BackendUpdate {
    /// Whether the update touches anything the network probe depends on
    #[must_use]
    pub fn needs_probe(&self) -> bool {
        self.credential.is_some()
            || self.model.is_some()
            || self.tuning.is_some()
            || self.enabled == Some(true)
    }
}
