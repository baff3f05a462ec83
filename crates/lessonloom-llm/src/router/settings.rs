//! Router-wide settings

use crate::backend::AdapterOptions;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default per-call timeout
pub const DEFAULT_TIMEOUT_MS: u64 = 60_000;

/// Settings owned by the router
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RouterSettings {
    /// Backend preferred by the default policy
    pub default_backend_id: Option<String>,
    /// Re-dispatch retryable failures to another backend
    pub fallback_enabled: bool,
    /// Upper bound for one adapter call
    pub timeout_ms: u64,
    /// Connection-level retries inside an adapter
    pub retry_attempts: u32,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            default_backend_id: None,
            fallback_enabled: true,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            retry_attempts: 0,
        }
    }
}

impl RouterSettings {
    /// Per-call timeout as a duration
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Transport options handed to the backend factory
    #[must_use]
    pub fn adapter_options(&self) -> AdapterOptions {
        AdapterOptions {
            timeout: self.timeout(),
            retry_attempts: self.retry_attempts,
        }
    }

    /// Reject settings the router cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.timeout_ms == 0 {
            return Err(Error::InvalidConfig(
                "timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
