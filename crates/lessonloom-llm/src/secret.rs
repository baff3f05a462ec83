//! Secure string implementation with cryptographic memory wiping

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A credential string that is zeroed from memory when dropped
///
/// Debug and Display redact the value. Serialization writes the raw value,
/// since backend configs and share payloads must carry the credential.
///
/// # Example
///
/// ```
/// use lessonloom_llm::SecureString;
///
/// let secret = SecureString::new("api-key-12345");
/// assert_eq!(secret.expose(), "api-key-12345");
/// assert!(!format!("{:?}", secret).contains("api-key"));
/// ```
#[derive(Clone, Default, Zeroize, ZeroizeOnDrop)]
pub struct SecureString {
    inner: String,
}

impl SecureString {
    /// Create a new secure string
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self { inner: s.into() }
    }

    /// Temporarily expose the string value
    ///
    /// Keep the returned reference short-lived.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.inner
    }

    /// Get the length of the secret
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Check if the secret is empty or whitespace only
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.inner.trim().is_empty()
    }

    /// Check if the secret is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Masked form for logs
    #[must_use]
    pub fn masked(&self) -> String {
        crate::util::mask_api_key(&self.inner)
    }
}

impl std::fmt::Debug for SecureString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SecureString([REDACTED, {} bytes])", self.inner.len())
    }
}

impl std::fmt::Display for SecureString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl PartialEq for SecureString {
    fn eq(&self, other: &Self) -> bool {
        self.inner.as_bytes().ct_eq(other.inner.as_bytes()).into()
    }
}

impl Eq for SecureString {}

impl From<String> for SecureString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SecureString {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl Serialize for SecureString {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.inner)
    }
}

impl<'de> Deserialize<'de> for SecureString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_and_display_redact() {
        let secret = SecureString::new("sk-live-0123456789");
        assert!(!format!("{:?}", secret).contains("0123456789"));
        assert_eq!(format!("{}", secret), "[REDACTED]");
    }

    #[test]
    fn test_serde_carries_raw_value() {
        let secret = SecureString::new("gsk_abcdef");
        let json = serde_json::to_string(&secret).unwrap();
        assert_eq!(json, "\"gsk_abcdef\"");
        let back: SecureString = serde_json::from_str(&json).unwrap();
        assert_eq!(back, secret);
    }

    #[test]
    fn test_blank() {
        assert!(SecureString::new("   ").is_blank());
        assert!(!SecureString::new("k").is_blank());
    }
}
