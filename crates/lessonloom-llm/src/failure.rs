//! Failure taxonomy for backend calls
//!
//! Adapters never let transport errors escape: every problem is classified
//! into an [`ErrorKind`] and returned as a [`Failure`] value so the router
//! can branch on `retryable`.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// Classified failure kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    /// Credential rejected by the provider
    CredentialInvalid,
    /// Account quota or billing limit reached
    QuotaExceeded,
    /// Too many requests in a short window
    RateLimited,
    /// Requested model does not exist or is not served
    ModelUnavailable,
    /// Connection failure, timeout or provider outage
    NetworkError,
    /// Provider answered with something we could not parse
    ParsingError,
    /// Anything else
    Unknown,
}

impl ErrorKind {
    /// Whether another attempt (possibly on another backend) may succeed
    #[must_use]
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::QuotaExceeded | Self::RateLimited | Self::NetworkError
        )
    }

    /// Returns the string representation
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CredentialInvalid => "credentialInvalid",
            Self::QuotaExceeded => "quotaExceeded",
            Self::RateLimited => "rateLimited",
            Self::ModelUnavailable => "modelUnavailable",
            Self::NetworkError => "networkError",
            Self::ParsingError => "parsingError",
            Self::Unknown => "unknown",
        }
    }

    /// Classify a provider error from its HTTP status (if any) and text
    ///
    /// Status codes win over text, except that a 429 mentioning quota or
    /// billing is a quota problem rather than a rate limit.
    #[must_use]
    pub fn classify(status: Option<u16>, message: &str) -> Self {
        let lower = message.to_lowercase();
        let status = status.or_else(|| status_in_text(&lower));

        let quota = contains_any(
            &lower,
            &[
                "quota",
                "billing",
                "insufficient_quota",
                "credit balance",
                "resource_exhausted",
                "exceeded your current",
            ],
        );

        match status {
            Some(401) | Some(403) => return Self::CredentialInvalid,
            Some(402) => return Self::QuotaExceeded,
            Some(429) if quota => return Self::QuotaExceeded,
            Some(429) => return Self::RateLimited,
            Some(404) => return Self::ModelUnavailable,
            Some(408) | Some(500..=599) => return Self::NetworkError,
            _ => {}
        }

        if contains_any(
            &lower,
            &[
                "api key",
                "api_key",
                "apikey",
                "invalid key",
                "unauthorized",
                "authentication",
                "permission denied",
                "invalid x-api-key",
            ],
        ) {
            Self::CredentialInvalid
        } else if quota {
            Self::QuotaExceeded
        } else if contains_any(&lower, &["rate limit", "rate_limit", "too many requests"]) {
            Self::RateLimited
        } else if lower.contains("model")
            && contains_any(
                &lower,
                &["not found", "does not exist", "unavailable", "not supported"],
            )
        {
            Self::ModelUnavailable
        } else if contains_any(
            &lower,
            &[
                "timeout",
                "timed out",
                "network",
                "connection",
                "dns",
                "overloaded",
                "unavailable",
            ],
        ) {
            Self::NetworkError
        } else if contains_any(
            &lower,
            &["json", "parse", "decode", "unexpected token", "invalid response"],
        ) {
            Self::ParsingError
        } else {
            Self::Unknown
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

/// Pick an HTTP status out of text such as "HTTP 429: ..." or "status 503"
fn status_in_text(lower: &str) -> Option<u16> {
    static STATUS: OnceLock<Option<Regex>> = OnceLock::new();
    STATUS
        .get_or_init(|| Regex::new(r"(?:http|status)[ :=]*([1-5][0-9]{2})\b").ok())
        .as_ref()?
        .captures(lower)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// A classified failure of one backend call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Failure {
    /// Failure class
    pub error_kind: ErrorKind,
    /// Sanitized, human-readable message
    pub message: String,
    /// Backend that produced the failure (empty when none was selected)
    pub backend_id: String,
    /// Whether the router may re-dispatch
    pub retryable: bool,
}

impl Failure {
    /// Create a failure; `retryable` follows the kind
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>, backend_id: impl Into<String>) -> Self {
        Self {
            error_kind: kind,
            message: message.into(),
            backend_id: backend_id.into(),
            retryable: kind.is_retryable(),
        }
    }

    /// Classify raw provider output into a failure
    #[must_use]
    pub fn classify(status: Option<u16>, raw: &str, backend_id: impl Into<String>) -> Self {
        let kind = ErrorKind::classify(status, raw);
        let message = match status {
            Some(code) => format!("HTTP {}: {}", code, crate::util::sanitize_error(raw)),
            None => crate::util::sanitize_error(raw),
        };
        Self::new(kind, message, backend_id)
    }

    /// Failure for a call that exceeded the router timeout
    #[must_use]
    pub fn timeout(timeout_ms: u64, backend_id: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::NetworkError,
            format!("request timed out after {}ms", timeout_ms),
            backend_id,
        )
    }

    /// Failure when no backend can be selected
    #[must_use]
    pub fn no_backend() -> Self {
        Self::new(ErrorKind::Unknown, "no enabled backend is configured", "")
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.backend_id.is_empty() {
            write!(f, "{}: {}", self.error_kind, self.message)
        } else {
            write!(f, "{} ({}): {}", self.error_kind, self.backend_id, self.message)
        }
    }
}

impl std::error::Error for Failure {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_by_status() {
        assert_eq!(ErrorKind::classify(Some(401), ""), ErrorKind::CredentialInvalid);
        assert_eq!(ErrorKind::classify(Some(403), "forbidden"), ErrorKind::CredentialInvalid);
        assert_eq!(ErrorKind::classify(Some(429), "slow down"), ErrorKind::RateLimited);
        assert_eq!(
            ErrorKind::classify(Some(429), "You exceeded your current quota"),
            ErrorKind::QuotaExceeded
        );
        assert_eq!(ErrorKind::classify(Some(404), ""), ErrorKind::ModelUnavailable);
        assert_eq!(ErrorKind::classify(Some(503), ""), ErrorKind::NetworkError);
    }

    #[test]
    fn test_classify_by_text() {
        assert_eq!(
            ErrorKind::classify(None, "Incorrect API key provided"),
            ErrorKind::CredentialInvalid
        );
        assert_eq!(
            ErrorKind::classify(None, "Rate limit reached for requests"),
            ErrorKind::RateLimited
        );
        assert_eq!(
            ErrorKind::classify(None, "The model `gpt-9` does not exist"),
            ErrorKind::ModelUnavailable
        );
        assert_eq!(
            ErrorKind::classify(None, "error sending request: connection refused"),
            ErrorKind::NetworkError
        );
        assert_eq!(
            ErrorKind::classify(None, "expected value at line 1 column 1 (json)"),
            ErrorKind::ParsingError
        );
        assert_eq!(ErrorKind::classify(None, "something odd"), ErrorKind::Unknown);
    }

    #[test]
    fn test_classify_status_embedded_in_text() {
        assert_eq!(
            ErrorKind::classify(None, "HTTP 429: busy"),
            ErrorKind::RateLimited
        );
    }

    #[test]
    fn test_retryable_flags() {
        assert!(ErrorKind::QuotaExceeded.is_retryable());
        assert!(ErrorKind::RateLimited.is_retryable());
        assert!(ErrorKind::NetworkError.is_retryable());
        assert!(!ErrorKind::CredentialInvalid.is_retryable());
        assert!(!ErrorKind::ModelUnavailable.is_retryable());
        assert!(!ErrorKind::Unknown.is_retryable());
    }

    #[test]
    fn test_no_backend_failure() {
        let failure = Failure::no_backend();
        assert_eq!(failure.error_kind, ErrorKind::Unknown);
        assert!(!failure.retryable);
        assert!(failure.backend_id.is_empty());
    }

    #[test]
    fn test_kind_serializes_camel_case() {
        let json = serde_json::to_string(&ErrorKind::CredentialInvalid).unwrap();
        assert_eq!(json, "\"credentialInvalid\"");
    }
}
