//! Tests for router module

use super::*;
use crate::backend::{BackendConfig, BackendKind, BackendUpdate, NewBackend};
use crate::error::Error;
use crate::failure::ErrorKind;
use crate::request::{GenerateRequest, GenerateResult};
use crate::store::{
    KeyValueStore, MemoryKvStore, MockKeyValueStore, ROUTER_STATE_KEY, USAGE_STATS_KEY,
};
use std::sync::Arc;
use std::time::Duration;

fn setup() -> (Arc<MockBackendFactory>, Router) {
    let factory = Arc::new(MockBackendFactory::new());
    let router = Router::new(factory.clone());
    (factory, router)
}

async fn add(router: &Router, name: &str) -> BackendConfig {
    router
        .add_backend(NewBackend::new(name, BackendKind::OpenAi, "sk-test-0123456789"))
        .await
        .unwrap()
}

fn request() -> GenerateRequest {
    GenerateRequest::new("Write a warm-up activity")
}

// ============================================================================
// Dispatch
// ============================================================================

#[tokio::test]
async fn test_no_backend_fails_fast() {
    let (factory, router) = setup();

    let result = router
        .generate_content(&request(), SelectionPolicy::Default)
        .await;

    let failure = result.failure().unwrap();
    assert_eq!(failure.error_kind, ErrorKind::Unknown);
    assert!(!failure.retryable);
    assert_eq!(factory.total_calls(), 0);
}

#[tokio::test]
async fn test_only_disabled_backends_fails_fast() {
    let (factory, router) = setup();
    router
        .add_backend(
            NewBackend::new("off", BackendKind::Anthropic, "sk-ant-0123456789")
                .with_enabled(false),
        )
        .await
        .unwrap();

    for policy in [
        SelectionPolicy::Default,
        SelectionPolicy::Fastest,
        SelectionPolicy::Fallback,
        SelectionPolicy::LoadBalance,
    ] {
        let result = router.generate_content(&request(), policy).await;
        assert_eq!(result.failure().unwrap().error_kind, ErrorKind::Unknown);
    }
    assert_eq!(factory.total_calls(), 0);
}

#[tokio::test]
async fn test_success_records_usage() {
    let (_, router) = setup();
    let primary = add(&router, "primary").await;

    let result = router
        .generate_content(&request(), SelectionPolicy::Default)
        .await;

    let GenerateResult::Success(success) = result else {
        panic!("expected success");
    };
    assert_eq!(success.backend_id, primary.id);
    assert_eq!(success.text(), "mock response");

    let stat = router.usage_stat(&primary.id).await.unwrap();
    assert_eq!(stat.total_requests, 1);
    assert_eq!(stat.successful_requests, 1);
    assert_eq!(stat.total_tokens, 12);
}

#[tokio::test]
async fn test_network_error_redispatches_exactly_once() {
    let (factory, router) = setup();
    let _primary = add(&router, "primary").await;
    let secondary = add(&router, "secondary").await;
    factory
        .script("primary")
        .set_default(MockReply::Fail(ErrorKind::NetworkError));

    let result = router
        .generate_content(&request(), SelectionPolicy::Default)
        .await;

    assert!(result.is_success());
    assert_eq!(result.backend_id(), secondary.id);
    assert_eq!(factory.script("primary").calls(), 1);
    assert_eq!(factory.script("secondary").calls(), 1);
}

#[tokio::test]
async fn test_redispatch_is_bounded_when_everything_fails() {
    let (factory, router) = setup();
    for name in ["a", "b", "c"] {
        add(&router, name).await;
        factory
            .script(name)
            .set_default(MockReply::Fail(ErrorKind::RateLimited));
    }

    let result = router
        .generate_content(&request(), SelectionPolicy::LoadBalance)
        .await;

    let failure = result.failure().unwrap();
    assert_eq!(failure.error_kind, ErrorKind::RateLimited);
    assert_eq!(factory.total_calls(), 2);
}

#[tokio::test]
async fn test_last_failure_is_returned() {
    let (factory, router) = setup();
    add(&router, "primary").await;
    let secondary = add(&router, "secondary").await;
    factory
        .script("primary")
        .set_default(MockReply::Fail(ErrorKind::NetworkError));
    factory
        .script("secondary")
        .set_default(MockReply::Fail(ErrorKind::QuotaExceeded));

    let result = router
        .generate_content(&request(), SelectionPolicy::Default)
        .await;

    let failure = result.failure().unwrap();
    assert_eq!(failure.backend_id, secondary.id);
    assert_eq!(failure.error_kind, ErrorKind::QuotaExceeded);
}

#[tokio::test]
async fn test_single_backend_failure_is_not_retried_on_itself() {
    let (factory, router) = setup();
    add(&router, "only").await;
    factory
        .script("only")
        .set_default(MockReply::Fail(ErrorKind::NetworkError));

    let result = router
        .generate_content(&request(), SelectionPolicy::Default)
        .await;

    assert_eq!(
        result.failure().unwrap().error_kind,
        ErrorKind::NetworkError
    );
    assert_eq!(factory.script("only").calls(), 1);
}

#[tokio::test]
async fn test_non_retryable_failure_is_surfaced() {
    let (factory, router) = setup();
    add(&router, "primary").await;
    add(&router, "secondary").await;
    factory
        .script("primary")
        .set_default(MockReply::Fail(ErrorKind::CredentialInvalid));

    let result = router
        .generate_content(&request(), SelectionPolicy::Default)
        .await;

    assert_eq!(
        result.failure().unwrap().error_kind,
        ErrorKind::CredentialInvalid
    );
    assert_eq!(factory.script("secondary").calls(), 0);
}

#[tokio::test]
async fn test_no_redispatch_when_fallback_disabled() {
    let factory = Arc::new(MockBackendFactory::new());
    let router = Router::with_settings(
        factory.clone(),
        RouterSettings {
            fallback_enabled: false,
            ..Default::default()
        },
    );
    add(&router, "primary").await;
    add(&router, "secondary").await;
    factory
        .script("primary")
        .set_default(MockReply::Fail(ErrorKind::NetworkError));

    let result = router
        .generate_content(&request(), SelectionPolicy::Default)
        .await;

    assert!(!result.is_success());
    assert_eq!(factory.script("secondary").calls(), 0);
}

#[tokio::test]
async fn test_no_redispatch_under_fallback_policy() {
    let (factory, router) = setup();
    add(&router, "primary").await;
    add(&router, "secondary").await;
    factory
        .script("primary")
        .set_default(MockReply::Fail(ErrorKind::NetworkError));

    let result = router
        .generate_content(&request(), SelectionPolicy::Fallback)
        .await;

    assert!(!result.is_success());
    assert_eq!(factory.total_calls(), 1);
}

#[tokio::test]
async fn test_timeout_is_retryable_network_error() {
    let factory = Arc::new(MockBackendFactory::new());
    let router = Router::with_settings(
        factory.clone(),
        RouterSettings {
            timeout_ms: 50,
            ..Default::default()
        },
    );
    let slow = add(&router, "slow").await;
    let fast = add(&router, "fast").await;
    factory.script("slow").set_default(MockReply::Hang);

    let result = router
        .generate_content(&request(), SelectionPolicy::Default)
        .await;

    assert_eq!(result.backend_id(), fast.id);
    let stat = router.usage_stat(&slow.id).await.unwrap();
    assert_eq!(stat.failed_requests, 1);
    assert!(stat.average_latency_ms >= 50.0);
}

// ============================================================================
// Selection policies
// ============================================================================

#[tokio::test]
async fn test_fastest_without_history_uses_declaration_order() {
    let (factory, router) = setup();
    let first = add(&router, "first").await;
    add(&router, "second").await;
    add(&router, "third").await;

    for _ in 0..3 {
        let result = router
            .generate_content(&request(), SelectionPolicy::Fastest)
            .await;
        assert_eq!(result.backend_id(), first.id);
    }
    assert_eq!(factory.script("second").calls(), 0);
}

#[tokio::test]
async fn test_fastest_prefers_lower_latency() {
    let (factory, router) = setup();
    add(&router, "slow").await;
    let quick = add(&router, "quick").await;
    factory.script("slow").set_default(MockReply::Delayed(
        Duration::from_millis(80),
        "slow".to_string(),
    ));

    // Seed history on both backends
    router
        .generate_content(&request(), SelectionPolicy::LoadBalance)
        .await;
    router
        .generate_content(&request(), SelectionPolicy::LoadBalance)
        .await;

    let result = router
        .generate_content(&request(), SelectionPolicy::Fastest)
        .await;
    assert_eq!(result.backend_id(), quick.id);
}

#[tokio::test]
async fn test_load_balance_round_robin() {
    let (factory, router) = setup();
    for name in ["a", "b", "c"] {
        add(&router, name).await;
    }

    for _ in 0..6 {
        router
            .generate_content(&request(), SelectionPolicy::LoadBalance)
            .await;
    }

    for name in ["a", "b", "c"] {
        assert_eq!(factory.script(name).calls(), 2, "backend {}", name);
    }
}

#[tokio::test]
async fn test_default_policy_honours_default_backend() {
    let (_, router) = setup();
    add(&router, "first").await;
    let preferred = add(&router, "preferred").await;
    router.set_default_backend(&preferred.id).await.unwrap();

    let result = router
        .generate_content(&request(), SelectionPolicy::Default)
        .await;
    assert_eq!(result.backend_id(), preferred.id);
}

#[tokio::test]
async fn test_disabled_default_falls_back_to_first_enabled() {
    let (_, router) = setup();
    let first = add(&router, "first").await;
    let preferred = add(&router, "preferred").await;
    router.set_default_backend(&preferred.id).await.unwrap();
    router
        .update_backend(
            &preferred.id,
            BackendUpdate {
                enabled: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let result = router
        .generate_content(&request(), SelectionPolicy::Default)
        .await;
    assert_eq!(result.backend_id(), first.id);
}

// ============================================================================
// Backend management
// ============================================================================

#[tokio::test]
async fn test_add_then_remove_leaves_no_trace() {
    let (_, router) = setup();
    let config = add(&router, "temp").await;
    router
        .generate_content(&request(), SelectionPolicy::Default)
        .await;
    assert!(router.usage_stat(&config.id).await.is_some());

    router.remove_backend(&config.id).await.unwrap();

    assert!(router.list_backends().await.iter().all(|b| b.id != config.id));
    assert!(router.usage_stat(&config.id).await.is_none());
    assert!(router.usage_stats().await.is_empty());
    assert!(matches!(
        router.test_backend(&config.id).await,
        Err(Error::NotFound(_))
    ));
}

#[tokio::test]
async fn test_failed_probe_blocks_add() {
    let (factory, router) = setup();
    factory
        .script("broken")
        .fail_probe(ErrorKind::CredentialInvalid);

    let err = router
        .add_backend(NewBackend::new("broken", BackendKind::Gemini, "AIza-bad-key"))
        .await
        .unwrap_err();

    match err {
        Error::Probe(failure) => assert_eq!(failure.error_kind, ErrorKind::CredentialInvalid),
        other => panic!("unexpected error: {}", other),
    }
    assert!(router.list_backends().await.is_empty());
}

#[tokio::test]
async fn test_disabled_backend_is_stored_without_probe() {
    let (factory, router) = setup();
    factory.script("later").fail_probe(ErrorKind::NetworkError);

    let config = router
        .add_backend(
            NewBackend::new("later", BackendKind::OpenRouter, "sk-or-0123456789")
                .with_enabled(false),
        )
        .await
        .unwrap();

    assert!(!config.enabled);
    assert_eq!(factory.script("later").probes(), 0);
    assert_eq!(router.list_backends().await.len(), 1);
}

#[tokio::test]
async fn test_failed_probe_blocks_update() {
    let (factory, router) = setup();
    let config = add(&router, "main").await;
    factory.script("main").fail_probe(ErrorKind::CredentialInvalid);

    let result = router
        .update_backend(
            &config.id,
            BackendUpdate {
                credential: Some("sk-rotated-but-wrong".into()),
                ..Default::default()
            },
        )
        .await;

    assert!(matches!(result, Err(Error::Probe(_))));
    let stored = router.get_backend(&config.id).await.unwrap();
    assert_eq!(stored.credential.expose(), "sk-test-0123456789");
}

#[tokio::test]
async fn test_rename_does_not_probe() {
    let (factory, router) = setup();
    let config = add(&router, "main").await;
    let probes = factory.script("main").probes();
    factory.script("main").fail_probe(ErrorKind::NetworkError);

    let updated = router
        .update_backend(
            &config.id,
            BackendUpdate {
                name: Some("main".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.id, config.id);
    assert_eq!(factory.script("main").probes(), probes);
}

#[tokio::test]
async fn test_removing_default_clears_pointer() {
    let (_, router) = setup();
    let config = add(&router, "main").await;
    router.set_default_backend(&config.id).await.unwrap();
    router.set_default_backend(&config.id).await.unwrap();

    router.remove_backend(&config.id).await.unwrap();
    assert!(router.settings().await.default_backend_id.is_none());
}

#[tokio::test]
async fn test_set_default_unknown_backend() {
    let (_, router) = setup();
    assert!(matches!(
        router.set_default_backend("missing").await,
        Err(Error::NotFound(_))
    ));
}

#[tokio::test]
async fn test_test_all_backends_in_declaration_order() {
    let (factory, router) = setup();
    let good = add(&router, "good").await;
    let bad = add(&router, "bad").await;
    factory.script("bad").fail_probe(ErrorKind::QuotaExceeded);

    let results = router.test_all_backends().await;

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].backend_id, good.id);
    assert!(results[0].success);
    assert_eq!(results[1].backend_id, bad.id);
    assert!(!results[1].success);
    assert_eq!(
        results[1].error.as_ref().map(|f| f.error_kind),
        Some(ErrorKind::QuotaExceeded)
    );
}

#[tokio::test]
async fn test_seed_from_lookup() {
    let (factory, router) = setup();
    factory.script("Google Gemini").fail_probe(ErrorKind::CredentialInvalid);

    let lookup = |name: &str| match name {
        "OPENAI_API_KEY" => Some("sk-env-0123456789".to_string()),
        "GEMINI_API_KEY" => Some("AIza-env-bad".to_string()),
        "ANTHROPIC_API_KEY" => Some("   ".to_string()),
        _ => None,
    };

    let added = router.seed_from(lookup).await.unwrap();
    assert_eq!(added.len(), 1);
    assert_eq!(added[0].kind, BackendKind::OpenAi);

    // Existing kinds are not seeded twice
    let again = router.seed_from(lookup).await.unwrap();
    assert!(again.is_empty());
    assert_eq!(router.list_backends().await.len(), 1);
}

// ============================================================================
// Settings and persistence
// ============================================================================

#[tokio::test]
async fn test_reload_rebuilds_adapters_on_transport_change() {
    let (factory, router) = setup();
    add(&router, "main").await;
    assert_eq!(factory.script("main").builds(), 1);

    let mut settings = router.settings().await;
    settings.fallback_enabled = false;
    router.reload(settings.clone()).await.unwrap();
    assert_eq!(factory.script("main").builds(), 1);

    settings.timeout_ms = 5_000;
    settings.retry_attempts = 2;
    router.reload(settings).await.unwrap();
    assert_eq!(factory.script("main").builds(), 2);

    let options = factory.last_options().unwrap();
    assert_eq!(options.timeout, Duration::from_secs(5));
    assert_eq!(options.retry_attempts, 2);
}

#[tokio::test]
async fn test_reload_rejects_zero_timeout() {
    let (_, router) = setup();
    let settings = RouterSettings {
        timeout_ms: 0,
        ..Default::default()
    };
    assert!(matches!(
        router.reload(settings).await,
        Err(Error::InvalidConfig(_))
    ));
    assert_eq!(router.settings().await.timeout_ms, DEFAULT_TIMEOUT_MS);
}

#[tokio::test]
async fn test_state_survives_reload_from_storage() {
    let factory = Arc::new(MockBackendFactory::new());
    let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryKvStore::new());

    let router = Router::load(factory.clone(), kv.clone()).await.unwrap();
    let config = add(&router, "persisted").await;
    router.set_default_backend(&config.id).await.unwrap();
    router
        .generate_content(&request(), SelectionPolicy::Default)
        .await;
    drop(router);

    let reloaded = Router::load(factory, kv.clone()).await.unwrap();
    let backends = reloaded.list_backends().await;
    assert_eq!(backends.len(), 1);
    assert_eq!(backends[0].credential.expose(), "sk-test-0123456789");
    assert_eq!(
        reloaded.settings().await.default_backend_id.as_deref(),
        Some(config.id.as_str())
    );
    assert_eq!(
        reloaded.usage_stat(&config.id).await.unwrap().total_requests,
        1
    );

    reloaded.clear_usage_stats().await.unwrap();
    assert!(reloaded.usage_stats().await.is_empty());
    assert!(kv.get(USAGE_STATS_KEY).await.unwrap().is_none());
    assert!(kv.get(ROUTER_STATE_KEY).await.unwrap().is_some());
}

#[tokio::test]
async fn test_storage_failure_leaves_state_untouched() {
    let mut kv = MockKeyValueStore::new();
    kv.expect_get().returning(|_| Ok(None));
    kv.expect_set()
        .returning(|_, _| Err(Error::Storage("disk full".to_string())));

    let factory = Arc::new(MockBackendFactory::new());
    let router = Router::load(factory, Arc::new(kv)).await.unwrap();

    let result = router
        .add_backend(NewBackend::new("main", BackendKind::OpenAi, "sk-0123456789"))
        .await;

    assert!(matches!(result, Err(Error::Storage(_))));
    assert!(router.list_backends().await.is_empty());
}

#[tokio::test]
async fn test_list_models_and_capabilities() {
    let (_, router) = setup();
    let config = add(&router, "main").await;

    assert_eq!(
        router.list_models(&config.id).await.unwrap(),
        vec!["mock-model".to_string()]
    );
    assert!(!router.capabilities(&config.id).await.unwrap().vision);
    assert!(matches!(
        router.list_models("missing").await,
        Err(Error::NotFound(_))
    ));
}
