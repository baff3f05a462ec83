//! Backend selection policies

use crate::backend::BackendConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Strategy used to pick a backend for one request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SelectionPolicy {
    /// Configured default backend, else the first enabled one
    #[default]
    Default,
    /// Lowest mean latency; backends without history rank last
    Fastest,
    /// First enabled backend in declaration order
    Fallback,
    /// Round-robin over enabled backends
    LoadBalance,
}

impl SelectionPolicy {
    /// Returns the string representation
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Fastest => "fastest",
            Self::Fallback => "fallback",
            Self::LoadBalance => "load-balance",
        }
    }
}

impl fmt::Display for SelectionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SelectionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "default" => Ok(Self::Default),
            "fastest" => Ok(Self::Fastest),
            "fallback" => Ok(Self::Fallback),
            "load-balance" | "loadbalance" | "round-robin" => Ok(Self::LoadBalance),
            other => Err(format!("unknown selection policy: {}", other)),
        }
    }
}

/// Inputs to a selection beyond the candidate list
pub(crate) struct SelectionContext<'a> {
    pub default_backend_id: Option<&'a str>,
    pub latencies: &'a HashMap<String, f64>,
    /// Round-robin counter value (only read by `LoadBalance`)
    pub tick: usize,
}

/// Pick one of `candidates` (selectable backends in declaration order)
pub(crate) fn select<'a>(
    policy: SelectionPolicy,
    candidates: &[&'a BackendConfig],
    ctx: &SelectionContext<'_>,
) -> Option<&'a BackendConfig> {
    let first = candidates.first().copied()?;

    let chosen = match policy {
        SelectionPolicy::Default => ctx
            .default_backend_id
            .and_then(|id| candidates.iter().copied().find(|c| c.id == id))
            .unwrap_or(first),
        SelectionPolicy::Fallback => first,
        SelectionPolicy::LoadBalance => candidates[ctx.tick % candidates.len()],
        SelectionPolicy::Fastest => {
            let mut best = first;
            let mut best_latency = latency_of(ctx.latencies, first);
            for &candidate in &candidates[1..] {
                let latency = latency_of(ctx.latencies, candidate);
                // Strict comparison keeps declaration order on ties
                if latency < best_latency {
                    best = candidate;
                    best_latency = latency;
                }
            }
            best
        }
    };
    Some(chosen)
}

fn latency_of(latencies: &HashMap<String, f64>, config: &BackendConfig) -> f64 {
    latencies
        .get(&config.id)
        .copied()
        .unwrap_or(f64::INFINITY)
}
