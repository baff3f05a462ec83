//! Common utilities for backend adapters
//!
//! Shared helpers for masking credentials and cleaning up provider error
//! text before it reaches logs or users.

/// Minimum key length to display partial key
const MIN_KEY_LENGTH_FOR_PARTIAL_DISPLAY: usize = 16;

/// Number of characters to show at start/end of masked key
const KEY_MASK_VISIBLE_CHARS: usize = 4;

/// Longest provider error text passed through to callers
const MAX_ERROR_LEN: usize = 300;

/// Markers of credential material inside provider error bodies
const SECRET_MARKERS: &[&str] = &["sk-", "sk_", "gsk_", "AIza", "Bearer "];

/// Mask API key for safe display in logs
///
/// Shows first 4 and last 4 characters for keys of at least 16 characters,
/// so at most half of the key is ever visible; shorter keys become "****".
///
/// # Examples
/// ```
/// use lessonloom_llm::util::mask_api_key;
/// assert_eq!(mask_api_key("sk-1234567890abcdef"), "sk-1...cdef");
/// assert_eq!(mask_api_key("short"), "****");
/// ```
#[must_use]
pub fn mask_api_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() < MIN_KEY_LENGTH_FOR_PARTIAL_DISPLAY {
        return "****".to_string();
    }
    let head: String = chars[..KEY_MASK_VISIBLE_CHARS].iter().collect();
    let tail: String = chars[chars.len() - KEY_MASK_VISIBLE_CHARS..].iter().collect();
    format!("{}...{}", head, tail)
}

/// Truncate a string to at most `max_bytes` without splitting a character
#[must_use]
pub fn truncate_safe(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Sanitize provider error text for display
///
/// Drops anything after a credential marker and truncates overly long
/// bodies. The wording needed for classification is kept intact.
#[must_use]
pub fn sanitize_error(error: &str) -> String {
    let mut cleaned = error.trim().to_string();

    for marker in SECRET_MARKERS {
        if let Some(pos) = find_token_start(&cleaned, marker) {
            cleaned.truncate(pos);
            cleaned.push_str("[REDACTED]");
        }
    }

    if cleaned.len() > MAX_ERROR_LEN {
        format!("{}...(truncated)", truncate_safe(&cleaned, MAX_ERROR_LEN))
    } else {
        cleaned
    }
}

/// Position of `marker` where it begins a token (not inside a word)
fn find_token_start(haystack: &str, marker: &str) -> Option<usize> {
    haystack.match_indices(marker).map(|(pos, _)| pos).find(|&pos| {
        haystack[..pos]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphanumeric())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_error_ignores_words() {
        assert_eq!(sanitize_error("task-queue full"), "task-queue full");
    }

    #[test]
    fn test_mask_api_key_long() {
        let key = "sk-1234567890abcdefghij";
        let masked = mask_api_key(key);
        assert_eq!(masked, "sk-1...ghij");
        assert!(!masked.contains("567890"));
    }

    #[test]
    fn test_mask_api_key_short() {
        assert_eq!(mask_api_key("short"), "****");
        assert_eq!(mask_api_key("12345678"), "****");
        assert_eq!(mask_api_key("123456789"), "****");
        assert_eq!(mask_api_key("sk-0123456789ab"), "****");
        assert_eq!(mask_api_key(""), "****");
    }

    #[test]
    fn test_mask_api_key_threshold() {
        assert_eq!(mask_api_key("abcd12345678wxyz"), "abcd...wxyz");
    }

    #[test]
    fn test_truncate_safe_multibyte() {
        let s = "héllo";
        assert_eq!(truncate_safe(s, 2), "h");
        assert_eq!(truncate_safe(s, 100), s);
    }

    #[test]
    fn test_sanitize_error_redacts_key() {
        let sanitized = sanitize_error("Incorrect API key provided: sk-proj-abcdef123456");
        assert!(sanitized.starts_with("Incorrect API key provided"));
        assert!(!sanitized.contains("abcdef123456"));
        assert!(sanitized.ends_with("[REDACTED]"));
    }

    #[test]
    fn test_sanitize_error_truncates() {
        let long = "x".repeat(1000);
        let sanitized = sanitize_error(&long);
        assert!(sanitized.ends_with("...(truncated)"));
        assert!(sanitized.len() < 400);
    }

    #[test]
    fn test_sanitize_error_safe_passthrough() {
        assert_eq!(sanitize_error("Connection timeout"), "Connection timeout");
    }
}
