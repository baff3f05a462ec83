//! Integration tests for Lessonloom
//!
//! These tests verify the integration between the workspace crates:
//! - lessonloom-llm: routing, fallback and file-backed persistence
//! - lessonloom-share: encrypted bundles moving backends between routers

use std::sync::Arc;

use lessonloom_llm::{
    BackendKind, ErrorKind, FileKvStore, GenerateRequest, MockBackendFactory, MockReply,
    NewBackend, Router, RouterSettings, SelectionPolicy,
};
use lessonloom_share::{FileBlobStore, ShareError, ShareService};

const PASSPHRASE: &str = "P@ssw0rd1";

// ============================================================================
// Router persistence
// ============================================================================

#[tokio::test]
async fn test_router_state_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let kv = Arc::new(FileKvStore::new(dir.path()));

    let factory = Arc::new(MockBackendFactory::new());
    let router = Router::load(factory.clone(), kv.clone()).await.unwrap();
    let primary = router
        .add_backend(NewBackend::new("primary", BackendKind::OpenAi, "sk-0123456789abcdef"))
        .await
        .unwrap();
    let backup = router
        .add_backend(NewBackend::new("backup", BackendKind::Anthropic, "sk-ant-0123456789"))
        .await
        .unwrap();
    router.set_default_backend(&backup.id).await.unwrap();

    let result = router
        .generate_content(&GenerateRequest::new("Plan a fractions lesson"), SelectionPolicy::Default)
        .await;
    assert_eq!(result.backend_id(), backup.id);
    drop(router);

    let reopened = Router::load(Arc::new(MockBackendFactory::new()), kv)
        .await
        .unwrap();
    let names: Vec<_> = reopened
        .list_backends()
        .await
        .into_iter()
        .map(|c| c.name)
        .collect();
    assert_eq!(names, vec!["primary", "backup"]);
    assert_eq!(
        reopened.settings().await.default_backend_id.as_deref(),
        Some(backup.id.as_str())
    );

    let stat = reopened.usage_stat(&backup.id).await.unwrap();
    assert_eq!(stat.total_requests, 1);
    assert!(reopened.usage_stat(&primary.id).await.is_none());
}

#[tokio::test]
async fn test_fallback_serves_request_when_default_is_rate_limited() {
    let factory = Arc::new(MockBackendFactory::new());
    factory
        .script("busy")
        .push(MockReply::Fail(ErrorKind::RateLimited));
    factory
        .script("spare")
        .set_default(MockReply::Text("{\"title\":\"Photosynthesis\"}".to_string()));

    let router = Router::with_settings(factory.clone(), RouterSettings::default());
    let busy = router
        .add_backend(NewBackend::new("busy", BackendKind::Gemini, "AIza0123456789abc"))
        .await
        .unwrap();
    let spare = router
        .add_backend(NewBackend::new("spare", BackendKind::OpenRouter, "sk-or-0123456789"))
        .await
        .unwrap();
    router.set_default_backend(&busy.id).await.unwrap();

    let result = router
        .generate_content(&GenerateRequest::new("Outline").json(), SelectionPolicy::Default)
        .await;
    assert!(result.is_success());
    assert_eq!(result.backend_id(), spare.id);
    assert_eq!(factory.total_calls(), 2);

    let busy_stat = router.usage_stat(&busy.id).await.unwrap();
    assert_eq!(busy_stat.failed_requests, 1);
}

// ============================================================================
// Sharing between installations
// ============================================================================

#[tokio::test]
async fn test_share_moves_backends_between_routers() {
    let dir = tempfile::tempdir().unwrap();
    let shares = ShareService::new(Arc::new(FileBlobStore::new(dir.path().join("shares"))));

    let sender = Router::new(Arc::new(MockBackendFactory::new()));
    let config = sender
        .add_backend(
            NewBackend::new("Dept Claude", BackendKind::Anthropic, "sk-ant-0123456789")
                .with_model("claude-3-5-haiku-latest"),
        )
        .await
        .unwrap();

    let id = shares
        .create_share(&[config], "Science department", PASSPHRASE, None)
        .await
        .unwrap();

    let preview = shares.preview_share(&id).await.unwrap();
    assert_eq!(preview.metadata.backend_count, 1);
    assert!(preview.metadata.backend_kinds.contains(&BackendKind::Anthropic));

    let recipient = Router::new(Arc::new(MockBackendFactory::new()));
    assert!(matches!(
        shares.import_share(&recipient, &id, "Wrong-pass1").await,
        Err(ShareError::DecryptionFailed)
    ));
    assert!(recipient.list_backends().await.is_empty());

    let imported = shares.import_share(&recipient, &id, PASSPHRASE).await.unwrap();
    assert_eq!(imported.len(), 1);
    assert_eq!(imported[0].model, "claude-3-5-haiku-latest");
    assert_eq!(imported[0].credential.expose(), "sk-ant-0123456789");

    let result = recipient
        .generate_content(&GenerateRequest::new("Quiz"), SelectionPolicy::Fastest)
        .await;
    assert!(result.is_success());
}
