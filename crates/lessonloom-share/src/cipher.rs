//! Passphrase-based authenticated encryption
//!
//! Encoded output is `base64(salt[16] || nonce[12] || ciphertext+tag)`.
//! The AES-256 key is derived per message with PBKDF2-HMAC-SHA256, so the
//! same passphrase never reuses a key across bundles. Every decryption
//! failure collapses into [`ShareError::DecryptionFailed`].

use crate::error::{Result, ShareError};
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::RngCore;
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// PBKDF2 iteration count
pub const PBKDF2_ITERATIONS: u32 = 100_000;
/// Salt size in bytes
pub const SALT_LEN: usize = 16;
/// AES-GCM nonce size in bytes
pub const NONCE_LEN: usize = 12;
/// Derived key size in bytes (AES-256)
pub const KEY_LEN: usize = 32;

const TAG_LEN: usize = 16;

/// Key material wiped on drop
#[derive(Zeroize, ZeroizeOnDrop)]
struct DerivedKey([u8; KEY_LEN]);

impl DerivedKey {
    fn derive(passphrase: &str, salt: &[u8]) -> Self {
        let mut key = [0u8; KEY_LEN];
        pbkdf2::pbkdf2_hmac::<Sha256>(passphrase.as_bytes(), salt, PBKDF2_ITERATIONS, &mut key);
        let derived = Self(key);
        key.zeroize();
        derived
    }

    fn cipher(&self) -> Option<Aes256Gcm> {
        Aes256Gcm::new_from_slice(&self.0).ok()
    }
}

/// Encrypt `plaintext` under `passphrase`
///
/// CPU-bound (PBKDF2); async callers should run it on a blocking thread.
pub fn encrypt(plaintext: &[u8], passphrase: &str) -> Result<String> {
    let mut salt = [0u8; SALT_LEN];
    let mut nonce = [0u8; NONCE_LEN];
    let mut rng = rand::thread_rng();
    rng.fill_bytes(&mut salt);
    rng.fill_bytes(&mut nonce);

    let key = DerivedKey::derive(passphrase, &salt);
    let cipher = key
        .cipher()
        .ok_or_else(|| ShareError::EncryptionFailed("invalid key length".to_string()))?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|_| ShareError::EncryptionFailed("AES-GCM encryption failed".to_string()))?;

    let mut packed = Vec::with_capacity(SALT_LEN + NONCE_LEN + ciphertext.len());
    packed.extend_from_slice(&salt);
    packed.extend_from_slice(&nonce);
    packed.extend_from_slice(&ciphertext);
    Ok(BASE64.encode(packed))
}

/// Decrypt output of [`encrypt`]
///
/// Malformed base64, truncated input, a wrong passphrase and a tampered
/// ciphertext all yield the same error.
pub fn decrypt(encoded: &str, passphrase: &str) -> Result<Zeroizing<Vec<u8>>> {
    let packed = BASE64
        .decode(encoded.trim())
        .map_err(|_| ShareError::DecryptionFailed)?;
    if packed.len() < SALT_LEN + NONCE_LEN + TAG_LEN {
        return Err(ShareError::DecryptionFailed);
    }

    let (salt, rest) = packed.split_at(SALT_LEN);
    let (nonce, ciphertext) = rest.split_at(NONCE_LEN);

    let key = DerivedKey::derive(passphrase, salt);
    let cipher = key.cipher().ok_or(ShareError::DecryptionFailed)?;
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map(Zeroizing::new)
        .map_err(|_| ShareError::DecryptionFailed)
}
