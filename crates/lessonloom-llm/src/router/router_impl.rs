//! Router implementation
//!
//! The [`Router`] owns the config store, one live adapter per backend and
//! the usage tracker. Generation never fails with an `Err`: it returns a
//! [`GenerateResult`]. Configuration calls are serialized by a writer lock
//! and follow stage → probe → persist → commit, so a failed probe or a
//! failed write leaves both memory and storage untouched.

use super::policy::{select, SelectionContext, SelectionPolicy};
use super::settings::RouterSettings;
use crate::backend::{
    Backend, BackendConfig, BackendFactory, BackendKind, BackendUpdate, Capabilities, NewBackend,
};
use crate::error::{Error, Result};
use crate::failure::Failure;
use crate::request::{GenerateRequest, GenerateResult};
use crate::store::{ConfigStore, KeyValueStore, ROUTER_STATE_KEY, USAGE_STATS_KEY};
use crate::usage::{UsageStat, UsageTracker};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn};

/// Re-dispatches allowed per logical request
pub const MAX_REDISPATCHES: u32 = 1;

/// Outcome of a connectivity test
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    /// Backend tested
    pub backend_id: String,
    /// Whether the probe got a well-formed reply
    pub success: bool,
    /// Probe round-trip time
    pub latency_ms: u64,
    /// Classified failure when `success` is false
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Failure>,
}

struct RouterState {
    store: ConfigStore,
    adapters: HashMap<String, Arc<dyn Backend>>,
}

/// Multi-backend dispatcher
pub struct Router {
    factory: Arc<dyn BackendFactory>,
    state: RwLock<RouterState>,
    usage: UsageTracker,
    round_robin: AtomicUsize,
    kv: Option<Arc<dyn KeyValueStore>>,
    writer: Mutex<()>,
    usage_writer: Mutex<()>,
}

impl Router {
    /// Router with default settings and no persistence
    #[must_use]
    pub fn new(factory: Arc<dyn BackendFactory>) -> Self {
        Self::with_settings(factory, RouterSettings::default())
    }

    /// Router with explicit settings and no persistence
    #[must_use]
    pub fn with_settings(factory: Arc<dyn BackendFactory>, settings: RouterSettings) -> Self {
        Self {
            factory,
            state: RwLock::new(RouterState {
                store: ConfigStore::new(settings),
                adapters: HashMap::new(),
            }),
            usage: UsageTracker::new(),
            round_robin: AtomicUsize::new(0),
            kv: None,
            writer: Mutex::new(()),
            usage_writer: Mutex::new(()),
        }
    }

    /// Load persisted state from `kv`, starting empty when none exists
    pub async fn load(factory: Arc<dyn BackendFactory>, kv: Arc<dyn KeyValueStore>) -> Result<Self> {
        Self::load_with_defaults(factory, kv, RouterSettings::default()).await
    }

    /// Like [`Router::load`], using `defaults` when nothing is persisted yet
    pub async fn load_with_defaults(
        factory: Arc<dyn BackendFactory>,
        kv: Arc<dyn KeyValueStore>,
        defaults: RouterSettings,
    ) -> Result<Self> {
        let store = match kv.get(ROUTER_STATE_KEY).await? {
            Some(json) => ConfigStore::from_json(&json)?,
            None => {
                defaults.validate()?;
                ConfigStore::new(defaults)
            }
        };
        let adapters = build_adapters(factory.as_ref(), &store)?;

        let usage = UsageTracker::new();
        if let Some(json) = kv.get(USAGE_STATS_KEY).await? {
            match serde_json::from_str::<Vec<UsageStat>>(&json) {
                Ok(stats) => {
                    usage.restore(stats).await;
                    usage.retain(|id| store.contains(id)).await;
                }
                Err(e) => warn!(error = %e, "Discarding unreadable usage stats"),
            }
        }

        info!(backends = store.len(), "Loaded router state");

        Ok(Self {
            factory,
            state: RwLock::new(RouterState { store, adapters }),
            usage,
            round_robin: AtomicUsize::new(0),
            kv: Some(kv),
            writer: Mutex::new(()),
            usage_writer: Mutex::new(()),
        })
    }

    // ========================================================================
    // Generation
    // ========================================================================

    /// Generate content with the backend chosen by `policy`
    ///
    /// A retryable failure is re-dispatched once under the fallback policy
    /// to the first enabled backend that has not failed yet, provided
    /// fallback is enabled and `policy` is not already the fallback policy.
    #[instrument(skip(self, request))]
    pub async fn generate_content(
        &self,
        request: &GenerateRequest,
        policy: SelectionPolicy,
    ) -> GenerateResult {
        let settings = self.settings().await;
        let mut policy = policy;
        let mut failed: Vec<String> = Vec::new();
        let mut redispatches = 0u32;
        let mut last_failure: Option<Failure> = None;

        loop {
            let Some(adapter) = self.select_adapter(policy, &failed).await else {
                return match last_failure {
                    Some(failure) => {
                        debug!("No untried backend left for fallback");
                        failure.into()
                    }
                    None => {
                        warn!("No enabled backend is configured");
                        Failure::no_backend().into()
                    }
                };
            };

            let failure = match self.invoke(&adapter, request, &settings).await {
                GenerateResult::Failure(failure) => failure,
                success => return success,
            };

            let may_redispatch = failure.retryable
                && settings.fallback_enabled
                && policy != SelectionPolicy::Fallback
                && redispatches < MAX_REDISPATCHES;
            if !may_redispatch {
                debug!(backend = %adapter.id(), kind = %failure.error_kind, "Returning failure");
                return failure.into();
            }

            warn!(
                backend = %adapter.id(),
                kind = %failure.error_kind,
                "Backend failed, re-dispatching with fallback policy"
            );
            redispatches += 1;
            failed.push(adapter.id().to_string());
            policy = SelectionPolicy::Fallback;
            last_failure = Some(failure);
        }
    }

    async fn select_adapter(
        &self,
        policy: SelectionPolicy,
        excluded: &[String],
    ) -> Option<Arc<dyn Backend>> {
        let latencies = match policy {
            SelectionPolicy::Fastest => self.usage.latencies().await,
            _ => HashMap::new(),
        };
        let tick = match policy {
            SelectionPolicy::LoadBalance => self.round_robin.fetch_add(1, Ordering::Relaxed),
            _ => 0,
        };

        let state = self.state.read().await;
        let candidates: Vec<&BackendConfig> = state
            .store
            .selectable()
            .filter(|c| !excluded.contains(&c.id) && state.adapters.contains_key(&c.id))
            .collect();
        let ctx = SelectionContext {
            default_backend_id: state.store.settings().default_backend_id.as_deref(),
            latencies: &latencies,
            tick,
        };

        let chosen = select(policy, &candidates, &ctx)?;
        debug!(backend = %chosen.id, name = %chosen.name, "Selected backend");
        state.adapters.get(&chosen.id).cloned()
    }

    async fn invoke(
        &self,
        adapter: &Arc<dyn Backend>,
        request: &GenerateRequest,
        settings: &RouterSettings,
    ) -> GenerateResult {
        let started = Instant::now();
        // Dropping the future on expiry cancels the in-flight HTTP call
        let result = match tokio::time::timeout(settings.timeout(), adapter.generate(request)).await
        {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    backend = %adapter.id(),
                    timeout_ms = settings.timeout_ms,
                    "Backend call timed out"
                );
                Failure::timeout(settings.timeout_ms, adapter.id()).into()
            }
        };
        let elapsed = started.elapsed();

        {
            // Holding the state lock keeps a concurrent removal from
            // leaving an orphaned stat behind.
            let state = self.state.read().await;
            if state.store.contains(adapter.id()) {
                let stat = self
                    .usage
                    .record(adapter.id(), result.is_success(), elapsed, result.usage())
                    .await;
                debug!(
                    backend = %adapter.id(),
                    success = result.is_success(),
                    latency_ms = elapsed.as_millis() as u64,
                    average_latency_ms = stat.average_latency_ms,
                    "Recorded usage"
                );
            }
        }
        self.persist_usage().await;

        result
    }

    // ========================================================================
    // Backend management
    // ========================================================================

    /// All backends in declaration order
    pub async fn list_backends(&self) -> Vec<BackendConfig> {
        self.state.read().await.store.backends().to_vec()
    }

    /// One backend
    pub async fn get_backend(&self, id: &str) -> Option<BackendConfig> {
        self.state.read().await.store.get(id).cloned()
    }

    /// Add a backend; enabled backends must pass a connectivity probe first
    #[instrument(skip(self, new), fields(name = %new.name, kind = %new.kind))]
    pub async fn add_backend(&self, new: NewBackend) -> Result<BackendConfig> {
        let config = new.into_config();
        config.validate()?;

        let _writer = self.writer.lock().await;
        let mut next = self.state.read().await.store.clone();
        let adapter = self
            .factory
            .build(&config, next.settings().adapter_options())?;
        if config.enabled {
            self.probe(&adapter, next.settings()).await.map_err(Error::Probe)?;
        }
        next.insert(config.clone())?;
        self.persist_store(&next).await?;

        let mut state = self.state.write().await;
        state.store = next;
        state.adapters.insert(config.id.clone(), adapter);

        info!(
            backend = %config.id,
            credential = %config.credential.masked(),
            enabled = config.enabled,
            "Backend added"
        );
        Ok(config)
    }

    /// Apply a partial update; re-probes when the change can affect
    /// connectivity and the result is enabled
    #[instrument(skip(self, update))]
    pub async fn update_backend(&self, id: &str, update: BackendUpdate) -> Result<BackendConfig> {
        let _writer = self.writer.lock().await;
        let mut next = self.state.read().await.store.clone();
        let current = next
            .get(id)
            .cloned()
            .ok_or_else(|| Error::NotFound(id.to_string()))?;

        let updated = current.updated(&update);
        updated.validate()?;
        let adapter = self
            .factory
            .build(&updated, next.settings().adapter_options())?;
        if updated.enabled && update.needs_probe() {
            self.probe(&adapter, next.settings()).await.map_err(Error::Probe)?;
        }
        next.replace(updated.clone())?;
        self.persist_store(&next).await?;

        let mut state = self.state.write().await;
        state.store = next;
        state.adapters.insert(updated.id.clone(), adapter);

        info!(backend = %updated.id, enabled = updated.enabled, "Backend updated");
        Ok(updated)
    }

    /// Remove a backend together with its adapter and usage stat
    #[instrument(skip(self))]
    pub async fn remove_backend(&self, id: &str) -> Result<BackendConfig> {
        let _writer = self.writer.lock().await;
        let mut next = self.state.read().await.store.clone();
        let removed = next.remove(id)?;
        self.persist_store(&next).await?;

        {
            let mut state = self.state.write().await;
            state.store = next;
            state.adapters.remove(id);
            self.usage.remove(id).await;
        }
        self.persist_usage().await;

        info!(backend = %id, "Backend removed");
        Ok(removed)
    }

    /// Point the default policy at `id`
    #[instrument(skip(self))]
    pub async fn set_default_backend(&self, id: &str) -> Result<()> {
        let _writer = self.writer.lock().await;
        let mut next = self.state.read().await.store.clone();
        if next.settings().default_backend_id.as_deref() == Some(id) {
            return Ok(());
        }
        next.set_default(id)?;
        self.persist_store(&next).await?;
        self.state.write().await.store = next;

        info!(backend = %id, "Default backend set");
        Ok(())
    }

    /// Probe one backend
    pub async fn test_backend(&self, id: &str) -> Result<TestResult> {
        let (adapter, settings) = {
            let state = self.state.read().await;
            let adapter = state
                .adapters
                .get(id)
                .cloned()
                .ok_or_else(|| Error::NotFound(id.to_string()))?;
            (adapter, state.store.settings().clone())
        };
        Ok(self.run_test(&adapter, &settings).await)
    }

    /// Probe every backend concurrently, reporting in declaration order
    pub async fn test_all_backends(&self) -> Vec<TestResult> {
        let (adapters, settings) = {
            let state = self.state.read().await;
            let adapters: Vec<Arc<dyn Backend>> = state
                .store
                .backends()
                .iter()
                .filter_map(|c| state.adapters.get(&c.id).cloned())
                .collect();
            (adapters, state.store.settings().clone())
        };

        futures::future::join_all(adapters.iter().map(|a| self.run_test(a, &settings))).await
    }

    /// Model catalogue of one backend
    pub async fn list_models(&self, id: &str) -> Result<Vec<String>> {
        let adapter = self.adapter(id).await?;
        Ok(adapter.list_models().await)
    }

    /// Capability metadata of one backend
    pub async fn capabilities(&self, id: &str) -> Result<Capabilities> {
        Ok(self.adapter(id).await?.capabilities())
    }

    /// Add a backend for each provider API key found through `lookup`
    ///
    /// Kinds that already have a backend are skipped, as are keys whose
    /// probe fails.
    pub async fn seed_from<F>(&self, lookup: F) -> Result<Vec<BackendConfig>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut added = Vec::new();
        for kind in BackendKind::ALL {
            let Some(key) = lookup(kind.api_key_env()).filter(|k| !k.trim().is_empty()) else {
                continue;
            };
            let exists = self
                .state
                .read()
                .await
                .store
                .backends()
                .iter()
                .any(|b| b.kind == kind);
            if exists {
                debug!(kind = %kind, "Backend kind already configured, not seeding");
                continue;
            }

            match self
                .add_backend(NewBackend::new(kind.display_name(), kind, key))
                .await
            {
                Ok(config) => added.push(config),
                Err(Error::Probe(failure)) => {
                    warn!(kind = %kind, error = %failure, "Skipping key from environment");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(added)
    }

    /// [`Router::seed_from`] over the process environment
    pub async fn seed_from_env(&self) -> Result<Vec<BackendConfig>> {
        self.seed_from(|name| std::env::var(name).ok()).await
    }

    // ========================================================================
    // Settings and statistics
    // ========================================================================

    /// Current settings
    pub async fn settings(&self) -> RouterSettings {
        self.state.read().await.store.settings().clone()
    }

    /// Replace settings; adapters are rebuilt when transport options change
    #[instrument(skip(self, settings))]
    pub async fn reload(&self, settings: RouterSettings) -> Result<()> {
        let _writer = self.writer.lock().await;
        let mut next = self.state.read().await.store.clone();
        let rebuild = next.settings().adapter_options() != settings.adapter_options();
        next.set_settings(settings)?;
        let adapters = if rebuild {
            Some(build_adapters(self.factory.as_ref(), &next)?)
        } else {
            None
        };
        self.persist_store(&next).await?;

        let mut state = self.state.write().await;
        state.store = next;
        if let Some(adapters) = adapters {
            state.adapters = adapters;
        }

        info!(rebuilt = rebuild, "Router settings reloaded");
        Ok(())
    }

    /// Stats for configured backends, in declaration order
    pub async fn usage_stats(&self) -> Vec<UsageStat> {
        let ids: Vec<String> = self
            .state
            .read()
            .await
            .store
            .backends()
            .iter()
            .map(|b| b.id.clone())
            .collect();

        let mut stats = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(stat) = self.usage.get(&id).await {
                stats.push(stat);
            }
        }
        stats
    }

    /// Stat for one backend
    pub async fn usage_stat(&self, id: &str) -> Option<UsageStat> {
        self.usage.get(id).await
    }

    /// Drop all usage statistics, in memory and in storage
    pub async fn clear_usage_stats(&self) -> Result<()> {
        let _usage_writer = self.usage_writer.lock().await;
        self.usage.clear().await;
        if let Some(kv) = &self.kv {
            kv.delete(USAGE_STATS_KEY).await?;
        }
        info!("Usage statistics cleared");
        Ok(())
    }

    // ========================================================================
    // Internals
    // ========================================================================

    async fn adapter(&self, id: &str) -> Result<Arc<dyn Backend>> {
        self.state
            .read()
            .await
            .adapters
            .get(id)
            .cloned()
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    async fn probe(
        &self,
        adapter: &Arc<dyn Backend>,
        settings: &RouterSettings,
    ) -> std::result::Result<(), Failure> {
        let outcome = match tokio::time::timeout(settings.timeout(), adapter.test_connection()).await
        {
            Ok(outcome) => outcome,
            Err(_) => Err(Failure::timeout(settings.timeout_ms, adapter.id())),
        };
        if let Err(failure) = &outcome {
            warn!(backend = %adapter.id(), error = %failure, "Connectivity probe failed");
        }
        outcome
    }

    async fn run_test(&self, adapter: &Arc<dyn Backend>, settings: &RouterSettings) -> TestResult {
        let started = Instant::now();
        let outcome = self.probe(adapter, settings).await;
        TestResult {
            backend_id: adapter.id().to_string(),
            success: outcome.is_ok(),
            latency_ms: started.elapsed().as_millis() as u64,
            error: outcome.err(),
        }
    }

    async fn persist_store(&self, store: &ConfigStore) -> Result<()> {
        let Some(kv) = &self.kv else {
            return Ok(());
        };
        kv.set(ROUTER_STATE_KEY, store.to_json()?).await?;
        debug!(backends = store.len(), "Persisted router state");
        Ok(())
    }

    async fn persist_usage(&self) {
        let Some(kv) = &self.kv else {
            return;
        };
        let _usage_writer = self.usage_writer.lock().await;
        let snapshot = self.usage.snapshot().await;
        let result = match serde_json::to_string(&snapshot) {
            Ok(json) => kv.set(USAGE_STATS_KEY, json).await,
            Err(e) => Err(e.into()),
        };
        if let Err(e) = result {
            warn!(error = %e, "Failed to persist usage stats");
        }
    }
}

fn build_adapters(
    factory: &dyn BackendFactory,
    store: &ConfigStore,
) -> Result<HashMap<String, Arc<dyn Backend>>> {
    let options = store.settings().adapter_options();
    store
        .backends()
        .iter()
        .map(|config| Ok((config.id.clone(), factory.build(config, options)?)))
        .collect()
}
