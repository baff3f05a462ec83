//! Bundle encoding: payload <-> encrypted envelope
//!
//! Both directions are CPU-bound. [`ShareService`](crate::ShareService)
//! runs them on the blocking pool; call them directly only off the async
//! runtime.

use crate::cipher;
use crate::data::{BundleMetadata, ShareBundle, ShareData, BUNDLE_VERSION};
use crate::error::{Result, ShareError};
use zeroize::Zeroizing;

/// Encrypt `data` into a new bundle with a fresh id
pub fn encrypt_bundle(
    data: &ShareData,
    passphrase: &str,
    name: impl Into<String>,
    description: Option<String>,
) -> Result<ShareBundle> {
    let plaintext = Zeroizing::new(serde_json::to_vec(data)?);
    let ciphertext = cipher::encrypt(&plaintext, passphrase)?;

    Ok(ShareBundle {
        id: uuid::Uuid::new_v4().to_string(),
        name: name.into(),
        description,
        ciphertext,
        metadata: BundleMetadata::describe(data),
    })
}

/// Decrypt a bundle back into its payload
///
/// An unknown envelope version is rejected before any key derivation.
/// Everything past that point fails as [`ShareError::DecryptionFailed`].
pub fn decrypt_bundle(bundle: &ShareBundle, passphrase: &str) -> Result<ShareData> {
    if bundle.metadata.version != BUNDLE_VERSION {
        return Err(ShareError::InvalidBundle(format!(
            "unsupported bundle version {}",
            bundle.metadata.version
        )));
    }

    let plaintext = cipher::decrypt(&bundle.ciphertext, passphrase)?;
    let data: ShareData =
        serde_json::from_slice(&plaintext).map_err(|_| ShareError::DecryptionFailed)?;

    if data.backends.len() != bundle.metadata.backend_count
        || data.kinds() != bundle.metadata.backend_kinds
    {
        return Err(ShareError::InvalidBundle(
            "metadata does not match the encrypted payload".to_string(),
        ));
    }
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lessonloom_llm::{BackendKind, NewBackend};

    fn sample() -> ShareData {
        let claude = NewBackend::new("Claude", BackendKind::Anthropic, "sk-ant-0123456789")
            .with_model("claude-sonnet-4-5")
            .into_config();
        let router = NewBackend::new("OpenRouter", BackendKind::OpenRouter, "sk-or-0123456789")
            .into_config();
        ShareData::from_configs([&claude, &router])
    }

    #[test]
    fn test_round_trip() {
        let data = sample();
        let bundle = encrypt_bundle(&data, "P@ssw0rd1", "Science dept", None).unwrap();
        assert_eq!(decrypt_bundle(&bundle, "P@ssw0rd1").unwrap(), data);
    }

    #[test]
    fn test_ciphertext_hides_credentials() {
        let bundle = encrypt_bundle(&sample(), "P@ssw0rd1", "Science dept", None).unwrap();
        let json = serde_json::to_string(&bundle).unwrap();
        assert!(!json.contains("sk-ant-0123456789"));
        assert!(json.contains("\"backendCount\":2"));
        assert!(json.contains("\"encrypted\":true"));
    }

    #[test]
    fn test_wrong_passphrase() {
        let bundle = encrypt_bundle(&sample(), "P@ssw0rd1", "Science dept", None).unwrap();
        assert!(matches!(
            decrypt_bundle(&bundle, "p@ssw0rd1"),
            Err(ShareError::DecryptionFailed)
        ));
    }

    #[test]
    fn test_unknown_version() {
        let mut bundle = encrypt_bundle(&sample(), "P@ssw0rd1", "Science dept", None).unwrap();
        bundle.metadata.version = 2;
        assert!(matches!(
            decrypt_bundle(&bundle, "P@ssw0rd1"),
            Err(ShareError::InvalidBundle(_))
        ));
    }

    #[test]
    fn test_forged_metadata() {
        let mut bundle = encrypt_bundle(&sample(), "P@ssw0rd1", "Science dept", None).unwrap();
        bundle.metadata.backend_count = 7;
        assert!(matches!(
            decrypt_bundle(&bundle, "P@ssw0rd1"),
            Err(ShareError::InvalidBundle(_))
        ));
    }

    #[test]
    fn test_non_json_plaintext_is_generic_failure() {
        let mut bundle = encrypt_bundle(&sample(), "P@ssw0rd1", "Science dept", None).unwrap();
        bundle.ciphertext = cipher::encrypt(b"not json", "P@ssw0rd1").unwrap();
        assert!(matches!(
            decrypt_bundle(&bundle, "P@ssw0rd1"),
            Err(ShareError::DecryptionFailed)
        ));
    }
}
