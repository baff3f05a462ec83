//! Mock backends for testing
//!
//! [`MockBackendFactory`] hands out [`MockBackend`]s whose behaviour is
//! scripted per backend *name* (ids are assigned at creation, names are
//! known up front). Each script counts calls, so tests can assert that the
//! router did or did not reach the network.

use crate::backend::{
    AdapterOptions, Backend, BackendConfig, BackendFactory, Capabilities,
};
use crate::error::Result;
use crate::failure::{ErrorKind, Failure};
use crate::request::{GenerateRequest, GenerateResult, GenerateSuccess, ResponseFormat, TokenUsage};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One scripted reply
#[derive(Debug, Clone, PartialEq)]
pub enum MockReply {
    /// Succeed with this text (parsed leniently for JSON requests)
    Text(String),
    /// Fail with this kind
    Fail(ErrorKind),
    /// Succeed after sleeping
    Delayed(Duration, String),
    /// Never answer
    Hang,
}

/// Scripted behaviour shared by every adapter built for one backend name
#[derive(Debug)]
pub struct MockScript {
    replies: Mutex<VecDeque<MockReply>>,
    default_reply: Mutex<MockReply>,
    probe_failure: Mutex<Option<ErrorKind>>,
    generate_calls: AtomicUsize,
    probe_calls: AtomicUsize,
    builds: AtomicUsize,
}

impl Default for MockScript {
    fn default() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            default_reply: Mutex::new(MockReply::Text("mock response".to_string())),
            probe_failure: Mutex::new(None),
            generate_calls: AtomicUsize::new(0),
            probe_calls: AtomicUsize::new(0),
            builds: AtomicUsize::new(0),
        }
    }
}

impl MockScript {
    /// Queue a reply for the next generate call
    pub fn push(&self, reply: MockReply) {
        self.replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(reply);
    }

    /// Reply used once the queue is empty
    pub fn set_default(&self, reply: MockReply) {
        *self.default_reply.lock().unwrap_or_else(|e| e.into_inner()) = reply;
    }

    /// Make connectivity probes fail with `kind`
    pub fn fail_probe(&self, kind: ErrorKind) {
        *self.probe_failure.lock().unwrap_or_else(|e| e.into_inner()) = Some(kind);
    }

    /// Make connectivity probes succeed
    pub fn pass_probe(&self) {
        *self.probe_failure.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    /// Generate calls received
    #[must_use]
    pub fn calls(&self) -> usize {
        self.generate_calls.load(Ordering::SeqCst)
    }

    /// Probes received
    #[must_use]
    pub fn probes(&self) -> usize {
        self.probe_calls.load(Ordering::SeqCst)
    }

    /// Adapters built
    #[must_use]
    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    fn next_reply(&self) -> MockReply {
        let queued = self
            .replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        queued.unwrap_or_else(|| {
            self.default_reply
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .clone()
        })
    }
}

/// A backend that replays a [`MockScript`]
#[derive(Debug)]
pub struct MockBackend {
    config: BackendConfig,
    script: Arc<MockScript>,
}

impl MockBackend {
    /// Create a mock for `config`
    #[must_use]
    pub fn new(config: BackendConfig, script: Arc<MockScript>) -> Self {
        Self { config, script }
    }

    fn success(&self, text: String, format: ResponseFormat) -> GenerateResult {
        let usage = TokenUsage::new(8, 4);
        GenerateResult::Success(GenerateSuccess::from_text(
            text,
            format,
            Some(usage),
            &self.config.id,
            &self.config.model,
        ))
    }
}

#[async_trait::async_trait]
impl Backend for MockBackend {
    fn config(&self) -> &BackendConfig {
        &self.config
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            response_formats: vec![ResponseFormat::Json, ResponseFormat::Text],
            vision: false,
            function_calling: false,
            max_context_tokens: 8_192,
            models: vec!["mock-model".to_string()],
        }
    }

    async fn generate(&self, request: &GenerateRequest) -> GenerateResult {
        self.script.generate_calls.fetch_add(1, Ordering::SeqCst);
        match self.script.next_reply() {
            MockReply::Text(text) => self.success(text, request.response_format),
            MockReply::Fail(kind) => {
                Failure::new(kind, format!("mock {} failure", kind), &self.config.id).into()
            }
            MockReply::Delayed(delay, text) => {
                tokio::time::sleep(delay).await;
                self.success(text, request.response_format)
            }
            MockReply::Hang => std::future::pending::<GenerateResult>().await,
        }
    }

    async fn list_models(&self) -> Vec<String> {
        self.capabilities().models
    }

    async fn test_connection(&self) -> std::result::Result<(), Failure> {
        self.script.probe_calls.fetch_add(1, Ordering::SeqCst);
        let failure = *self
            .script
            .probe_failure
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        match failure {
            Some(kind) => Err(Failure::new(kind, "mock probe failure", &self.config.id)),
            None => Ok(()),
        }
    }
}

/// Factory producing [`MockBackend`]s
#[derive(Debug, Default)]
pub struct MockBackendFactory {
    scripts: Mutex<HashMap<String, Arc<MockScript>>>,
    last_options: Mutex<Option<AdapterOptions>>,
}

impl MockBackendFactory {
    /// Create a factory with no scripts
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Script for backends named `name` (created on first access)
    pub fn script(&self, name: &str) -> Arc<MockScript> {
        self.scripts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(name.to_string())
            .or_default()
            .clone()
    }

    /// Generate calls across every script
    #[must_use]
    pub fn total_calls(&self) -> usize {
        self.scripts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .map(|s| s.calls())
            .sum()
    }

    /// Options passed to the most recent build
    #[must_use]
    pub fn last_options(&self) -> Option<AdapterOptions> {
        *self.last_options.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl BackendFactory for MockBackendFactory {
    fn build(&self, config: &BackendConfig, options: AdapterOptions) -> Result<Arc<dyn Backend>> {
        let script = self.script(&config.name);
        script.builds.fetch_add(1, Ordering::SeqCst);
        *self.last_options.lock().unwrap_or_else(|e| e.into_inner()) = Some(options);
        Ok(Arc::new(MockBackend::new(config.clone(), script)))
    }
}
