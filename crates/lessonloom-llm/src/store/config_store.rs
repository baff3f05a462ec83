//! Config Store - backend configs and router settings
//!
//! Holds backends in declaration order, which is the order the `fallback`
//! and `default` policies fall back to. The store is plain data; probing
//! and locking are the router's job.

use crate::backend::BackendConfig;
use crate::error::{Error, Result};
use crate::router::RouterSettings;
use serde::{Deserialize, Serialize};

/// Backend configs plus router settings, persisted as one blob
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigStore {
    #[serde(default)]
    backends: Vec<BackendConfig>,
    #[serde(default)]
    settings: RouterSettings,
}

impl ConfigStore {
    /// Empty store with the given settings
    #[must_use]
    pub fn new(settings: RouterSettings) -> Self {
        Self {
            backends: Vec::new(),
            settings,
        }
    }

    /// Decode a persisted blob
    pub fn from_json(json: &str) -> Result<Self> {
        let store: Self = serde_json::from_str(json)?;
        store.check_unique_ids()?;
        store.settings.validate()?;
        Ok(store)
    }

    /// Encode for persistence
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// All backends in declaration order
    #[must_use]
    pub fn backends(&self) -> &[BackendConfig] {
        &self.backends
    }

    /// Backends the router may select, in declaration order
    pub fn selectable(&self) -> impl Iterator<Item = &BackendConfig> {
        self.backends.iter().filter(|b| b.is_selectable())
    }

    /// Look up a backend
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&BackendConfig> {
        self.backends.iter().find(|b| b.id == id)
    }

    /// Whether a backend exists
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Number of backends
    #[must_use]
    pub fn len(&self) -> usize {
        self.backends.len()
    }

    /// Whether there are no backends
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// Append a backend
    pub fn insert(&mut self, config: BackendConfig) -> Result<()> {
        if self.contains(&config.id) {
            return Err(Error::Duplicate(config.id));
        }
        self.backends.push(config);
        Ok(())
    }

    /// Replace a backend in place, keeping its position
    pub fn replace(&mut self, config: BackendConfig) -> Result<BackendConfig> {
        let slot = self
            .backends
            .iter_mut()
            .find(|b| b.id == config.id)
            .ok_or_else(|| Error::NotFound(config.id.clone()))?;
        if slot.kind != config.kind {
            return Err(Error::InvalidConfig(format!(
                "backend {} cannot change kind from {} to {}",
                config.id, slot.kind, config.kind
            )));
        }
        Ok(std::mem::replace(slot, config))
    }

    /// Remove a backend; clears the default pointer if it pointed here
    pub fn remove(&mut self, id: &str) -> Result<BackendConfig> {
        let index = self
            .backends
            .iter()
            .position(|b| b.id == id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        if self.settings.default_backend_id.as_deref() == Some(id) {
            self.settings.default_backend_id = None;
        }
        Ok(self.backends.remove(index))
    }

    /// Point the default at an existing backend
    pub fn set_default(&mut self, id: &str) -> Result<()> {
        if !self.contains(id) {
            return Err(Error::NotFound(id.to_string()));
        }
        self.settings.default_backend_id = Some(id.to_string());
        Ok(())
    }

    /// Router settings
    #[must_use]
    pub fn settings(&self) -> &RouterSettings {
        &self.settings
    }

    /// Replace router settings after validation
    pub fn set_settings(&mut self, settings: RouterSettings) -> Result<()> {
        settings.validate()?;
        if let Some(id) = settings.default_backend_id.as_deref() {
            if !self.contains(id) {
                return Err(Error::NotFound(id.to_string()));
            }
        }
        self.settings = settings;
        Ok(())
    }

    fn check_unique_ids(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for backend in &self.backends {
            if !seen.insert(backend.id.as_str()) {
                return Err(Error::Duplicate(backend.id.clone()));
            }
        }
        Ok(())
    }
}
