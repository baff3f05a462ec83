//! Configuration loading
//!
//! Handles loading configuration from embedded defaults, files, and environment.

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use lessonloom_llm::RouterSettings;
use serde::Deserialize;
use std::path::PathBuf;

/// Embedded default configuration (compiled into binary)
pub const DEFAULT_CONFIG: &str = include_str!("../config/default.toml");

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Root for persisted state; platform data dir when unset
    #[serde(default)]
    pub data_dir: Option<String>,
    /// Router settings used until some are persisted
    #[serde(default)]
    pub router: RouterDefaults,
}

/// Router settings seeded from configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RouterDefaults {
    pub timeout_ms: u64,
    pub retry_attempts: u32,
    pub fallback_enabled: bool,
}

impl Default for RouterDefaults {
    fn default() -> Self {
        let settings = RouterSettings::default();
        Self {
            timeout_ms: settings.timeout_ms,
            retry_attempts: settings.retry_attempts,
            fallback_enabled: settings.fallback_enabled,
        }
    }
}

impl RouterDefaults {
    /// Settings for a router with no persisted state
    pub fn settings(&self) -> RouterSettings {
        RouterSettings {
            default_backend_id: None,
            fallback_enabled: self.fallback_enabled,
            timeout_ms: self.timeout_ms,
            retry_attempts: self.retry_attempts,
        }
    }
}

impl AppConfig {
    /// Resolved data directory
    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = self.data_dir.as_deref().filter(|d| !d.trim().is_empty()) {
            return Ok(PathBuf::from(dir));
        }
        let base = dirs::data_dir()
            .or_else(dirs::home_dir)
            .context("Cannot determine data directory; set LESSONLOOM_DATA_DIR")?;
        Ok(base.join("lessonloom"))
    }

    /// Directory for router state
    pub fn state_dir(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join("state"))
    }

    /// Directory for share bundles
    pub fn shares_dir(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join("shares"))
    }
}

/// Load configuration from files and environment
pub fn load_config() -> Result<AppConfig> {
    let config = Config::builder()
        .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
        .add_source(File::with_name("config/local").required(false))
        // LESSONLOOM_ROUTER__TIMEOUT_MS: single "_" after the prefix, "__" between keys
        .add_source(
            Environment::with_prefix("LESSONLOOM")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    config
        .try_deserialize()
        .context("Failed to deserialize configuration")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_defaults_parse() {
        let config: AppConfig = Config::builder()
            .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert!(config.data_dir.is_none());
        assert_eq!(config.router.settings(), RouterSettings::default());
    }

    #[test]
    fn test_explicit_data_dir() {
        let config = AppConfig {
            data_dir: Some("/tmp/lessonloom-test".to_string()),
            router: RouterDefaults::default(),
        };
        assert_eq!(
            config.shares_dir().unwrap(),
            PathBuf::from("/tmp/lessonloom-test/shares")
        );
    }
}
