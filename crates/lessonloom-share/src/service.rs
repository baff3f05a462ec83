//! Share service: create, preview, load and import bundles
//!
//! Key derivation runs on the blocking pool so a share operation never
//! stalls concurrent generation requests. Passphrases and decoded payloads
//! are kept out of every log line.

use crate::blob::BlobStore;
use crate::codec::{decrypt_bundle, encrypt_bundle};
use crate::data::{SharePreview, ShareData};
use crate::error::{Result, ShareError};
use crate::password::password_strength;
use lessonloom_llm::{BackendConfig, Router};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use zeroize::Zeroizing;

/// Creates and opens share bundles kept in a [`BlobStore`]
pub struct ShareService {
    blobs: Arc<dyn BlobStore>,
}

impl ShareService {
    /// Service over `blobs`
    #[must_use]
    pub fn new(blobs: Arc<dyn BlobStore>) -> Self {
        Self { blobs }
    }

    /// Encrypt `configs` under `passphrase` and store the bundle
    ///
    /// Returns the share id. Weak passphrases and empty selections are
    /// rejected before any encryption happens.
    #[instrument(skip(self, configs, passphrase, description), fields(count = configs.len()))]
    pub async fn create_share(
        &self,
        configs: &[BackendConfig],
        name: &str,
        passphrase: &str,
        description: Option<String>,
    ) -> Result<String> {
        if configs.is_empty() {
            return Err(ShareError::Validation(vec![
                "select at least one backend to share".to_string(),
            ]));
        }
        let strength = password_strength(passphrase);
        if !strength.valid {
            return Err(ShareError::WeakPassphrase(strength.feedback));
        }

        let data = ShareData::from_configs(configs);
        let errors = data.validate();
        if !errors.is_empty() {
            return Err(ShareError::Validation(errors));
        }

        let passphrase = Zeroizing::new(passphrase.to_string());
        let name = name.to_string();
        let bundle = tokio::task::spawn_blocking(move || {
            encrypt_bundle(&data, &passphrase, name, description)
        })
        .await
        .map_err(|e| ShareError::EncryptionFailed(format!("encryption task failed: {}", e)))??;

        self.blobs.put(&bundle).await?;
        info!(
            share_id = %bundle.id,
            backends = bundle.metadata.backend_count,
            "Share created"
        );
        Ok(bundle.id)
    }

    /// Metadata of a stored share; no passphrase needed
    pub async fn preview_share(&self, id: &str) -> Result<SharePreview> {
        let bundle = self
            .blobs
            .get(id)
            .await?
            .ok_or_else(|| ShareError::NotFound(id.to_string()))?;
        Ok(SharePreview::from(&bundle))
    }

    /// Decrypt and validate a stored share
    #[instrument(skip(self, passphrase))]
    pub async fn load_share(&self, id: &str, passphrase: &str) -> Result<ShareData> {
        let bundle = self
            .blobs
            .get(id)
            .await?
            .ok_or_else(|| ShareError::NotFound(id.to_string()))?;

        let passphrase = Zeroizing::new(passphrase.to_string());
        let data = tokio::task::spawn_blocking(move || decrypt_bundle(&bundle, &passphrase))
            .await
            .map_err(|_| ShareError::DecryptionFailed)?
            .inspect_err(|e| warn!(share_id = %id, error = %e, "Share could not be opened"))?;

        let errors = data.validate();
        if !errors.is_empty() {
            return Err(ShareError::Validation(errors));
        }
        info!(share_id = %id, backends = data.backends.len(), "Share opened");
        Ok(data)
    }

    /// Delete a stored share; returns whether it existed
    pub async fn delete_share(&self, id: &str) -> Result<bool> {
        self.blobs.delete(id).await
    }

    /// Decrypt a share and add its backends to `router`
    ///
    /// Backends whose connectivity probe fails are skipped; the returned
    /// list holds the configs actually added.
    #[instrument(skip(self, router, passphrase))]
    pub async fn import_share(
        &self,
        router: &Router,
        id: &str,
        passphrase: &str,
    ) -> Result<Vec<BackendConfig>> {
        let data = self.load_share(id, passphrase).await?;

        let mut imported = Vec::new();
        for new in data.into_new_backends() {
            let name = new.name.clone();
            match router.add_backend(new).await {
                Ok(config) => imported.push(config),
                Err(lessonloom_llm::Error::Probe(failure)) => {
                    warn!(backend = %name, error = %failure, "Skipping shared backend");
                }
                Err(e) => return Err(e.into()),
            }
        }
        info!(share_id = %id, imported = imported.len(), "Share imported");
        Ok(imported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::{MemoryBlobStore, MockBlobStore};
    use lessonloom_llm::{BackendKind, ErrorKind, MockBackendFactory, NewBackend};

    const PASSPHRASE: &str = "P@ssw0rd1";

    fn configs() -> Vec<BackendConfig> {
        vec![
            NewBackend::new("OpenAI", BackendKind::OpenAi, "sk-0123456789abcdef").into_config(),
            NewBackend::new("Gemini", BackendKind::Gemini, "AIza0123456789abc").into_config(),
        ]
    }

    fn service() -> (ShareService, Arc<MemoryBlobStore>) {
        let blobs = Arc::new(MemoryBlobStore::new());
        (ShareService::new(blobs.clone()), blobs)
    }

    #[tokio::test]
    async fn test_create_preview_load() {
        let (service, blobs) = service();
        let id = service
            .create_share(&configs(), "Year 9 team", PASSPHRASE, Some("term 1".to_string()))
            .await
            .unwrap();
        assert_eq!(blobs.len().await, 1);

        let preview = service.preview_share(&id).await.unwrap();
        assert_eq!(preview.name, "Year 9 team");
        assert_eq!(preview.description.as_deref(), Some("term 1"));
        assert_eq!(preview.metadata.backend_count, 2);

        let data = service.load_share(&id, PASSPHRASE).await.unwrap();
        assert_eq!(data.backends.len(), 2);
        assert_eq!(data.backends[1].credential.expose(), "AIza0123456789abc");
    }

    #[tokio::test]
    async fn test_weak_passphrase_is_rejected_before_storage() {
        let (service, blobs) = service();
        let err = service
            .create_share(&configs(), "team", "abc", None)
            .await
            .unwrap_err();
        match err {
            ShareError::WeakPassphrase(feedback) => assert!(!feedback.is_empty()),
            other => panic!("unexpected error: {other}"),
        }
        assert!(blobs.is_empty().await);
    }

    #[tokio::test]
    async fn test_empty_selection_is_rejected() {
        let (service, _) = service();
        assert!(matches!(
            service.create_share(&[], "team", PASSPHRASE, None).await,
            Err(ShareError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_wrong_passphrase_and_unknown_id() {
        let (service, _) = service();
        let id = service
            .create_share(&configs(), "team", PASSPHRASE, None)
            .await
            .unwrap();

        assert!(matches!(
            service.load_share(&id, "Wr0ng!pass").await,
            Err(ShareError::DecryptionFailed)
        ));
        assert!(matches!(
            service.preview_share("missing").await,
            Err(ShareError::NotFound(_))
        ));
        assert!(service.delete_share(&id).await.unwrap());
    }

    #[tokio::test]
    async fn test_import_adds_backends_and_skips_failed_probes() {
        let (service, _) = service();
        let id = service
            .create_share(&configs(), "team", PASSPHRASE, None)
            .await
            .unwrap();

        let factory = Arc::new(MockBackendFactory::new());
        factory.script("Gemini").fail_probe(ErrorKind::CredentialInvalid);
        let router = Router::new(factory);

        let imported = service.import_share(&router, &id, PASSPHRASE).await.unwrap();
        assert_eq!(imported.len(), 1);
        assert_eq!(imported[0].name, "OpenAI");

        let listed = router.list_backends().await;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].credential.expose(), "sk-0123456789abcdef");
    }

    #[tokio::test]
    async fn test_storage_failure_surfaces() {
        let mut blobs = MockBlobStore::new();
        blobs
            .expect_put()
            .returning(|_| Err(ShareError::Storage("disk full".to_string())));
        let service = ShareService::new(Arc::new(blobs));

        assert!(matches!(
            service.create_share(&configs(), "team", PASSPHRASE, None).await,
            Err(ShareError::Storage(_))
        ));
    }
}
