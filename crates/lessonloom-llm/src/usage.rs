//! Usage Tracker - rolling per-backend statistics
//!
//! One [`UsageStat`] per backend id, created on first use. Writes go
//! through a single `RwLock` so concurrent requests cannot interleave the
//! running-mean update for the same backend.

use crate::request::TokenUsage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;

/// Statistics for one backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageStat {
    /// Backend id
    pub backend_id: String,
    /// Calls made
    pub total_requests: u64,
    /// Calls that returned content
    pub successful_requests: u64,
    /// Calls that returned a failure
    pub failed_requests: u64,
    /// Running mean latency over `total_requests`
    pub average_latency_ms: f64,
    /// Tokens reported by successful calls
    pub total_tokens: u64,
    /// Time of the most recent call
    pub last_used_at: Option<DateTime<Utc>>,
}

impl UsageStat {
    /// Empty stat for a backend
    #[must_use]
    pub fn new(backend_id: impl Into<String>) -> Self {
        Self {
            backend_id: backend_id.into(),
            total_requests: 0,
            successful_requests: 0,
            failed_requests: 0,
            average_latency_ms: 0.0,
            total_tokens: 0,
            last_used_at: None,
        }
    }

    /// Fold one call into the stat
    pub fn record(&mut self, success: bool, latency: Duration, usage: Option<TokenUsage>) {
        self.total_requests += 1;
        if success {
            self.successful_requests += 1;
        } else {
            self.failed_requests += 1;
        }

        let n = self.total_requests as f64;
        let elapsed = latency.as_secs_f64() * 1000.0;
        self.average_latency_ms = (self.average_latency_ms * (n - 1.0) + elapsed) / n;

        if let Some(usage) = usage {
            self.total_tokens += u64::from(usage.total_tokens);
        }
        self.last_used_at = Some(Utc::now());
    }

    /// Fraction of calls that succeeded (0.0 when unused)
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.successful_requests as f64 / self.total_requests as f64
        }
    }
}

/// Per-backend usage bookkeeping
#[derive(Debug, Default)]
pub struct UsageTracker {
    stats: RwLock<HashMap<String, UsageStat>>,
}

impl UsageTracker {
    /// Create an empty tracker
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one call, creating the stat on first use
    pub async fn record(
        &self,
        backend_id: &str,
        success: bool,
        latency: Duration,
        usage: Option<TokenUsage>,
    ) -> UsageStat {
        let mut stats = self.stats.write().await;
        let stat = stats
            .entry(backend_id.to_string())
            .or_insert_with(|| UsageStat::new(backend_id));
        stat.record(success, latency, usage);
        stat.clone()
    }

    /// Stat for one backend
    pub async fn get(&self, backend_id: &str) -> Option<UsageStat> {
        self.stats.read().await.get(backend_id).cloned()
    }

    /// Mean latency for each backend that has history
    pub async fn latencies(&self) -> HashMap<String, f64> {
        self.stats
            .read()
            .await
            .iter()
            .filter(|(_, s)| s.total_requests > 0)
            .map(|(id, s)| (id.clone(), s.average_latency_ms))
            .collect()
    }

    /// All stats, ordered by backend id
    pub async fn snapshot(&self) -> Vec<UsageStat> {
        let mut all: Vec<UsageStat> = self.stats.read().await.values().cloned().collect();
        all.sort_by(|a, b| a.backend_id.cmp(&b.backend_id));
        all
    }

    /// Drop the stat for a removed backend
    pub async fn remove(&self, backend_id: &str) -> Option<UsageStat> {
        self.stats.write().await.remove(backend_id)
    }

    /// Drop every stat
    pub async fn clear(&self) {
        self.stats.write().await.clear();
    }

    /// Replace all stats (used when loading persisted state)
    pub async fn restore(&self, stats: Vec<UsageStat>) {
        let mut map = self.stats.write().await;
        map.clear();
        for stat in stats {
            map.insert(stat.backend_id.clone(), stat);
        }
    }

    /// Keep only stats whose backend id satisfies `keep`
    pub async fn retain(&self, keep: impl Fn(&str) -> bool) {
        self.stats.write().await.retain(|id, _| keep(id));
    }
}
