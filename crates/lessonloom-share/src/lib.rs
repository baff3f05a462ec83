//! Lessonloom Share - passphrase-encrypted backend bundles
//!
//! Lets one educator hand a set of configured AI backends, credentials
//! included, to a colleague:
//! - Cipher: PBKDF2-HMAC-SHA256 key derivation + AES-256-GCM
//! - Codec: payload <-> bundle envelope with plaintext metadata
//! - Password: passphrase strength scoring
//! - Blob: bundle storage addressed by opaque id
//! - Service: create / preview / load / import

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod blob;
pub mod cipher;
pub mod codec;
pub mod data;
pub mod error;
pub mod password;
pub mod service;

pub use blob::{BlobStore, FileBlobStore, MemoryBlobStore};
pub use codec::{decrypt_bundle, encrypt_bundle};
pub use data::{BundleMetadata, ShareBundle, ShareData, SharePreview, SharedBackend, BUNDLE_VERSION};
pub use error::{Result, ShareError};
pub use password::{password_strength, PasswordStrength};
pub use service::ShareService;
