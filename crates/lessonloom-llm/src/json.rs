//! Best-effort JSON recovery from model output
//!
//! Models asked for JSON often wrap it in Markdown code fences or surround
//! it with prose. [`parse_lenient`] tries, in order: the whole text, the
//! body of the first code fence, and the first balanced `{...}` / `[...]`
//! span.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

/// Parse `text` as JSON, recovering from fences and surrounding prose
#[must_use]
pub fn parse_lenient(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Some(value);
    }

    if let Some(body) = fenced_body(trimmed) {
        if let Ok(value) = serde_json::from_str(body.trim()) {
            return Some(value);
        }
        if let Some(value) = first_balanced(body).and_then(|s| serde_json::from_str(s).ok()) {
            return Some(value);
        }
    }

    first_balanced(trimmed).and_then(|s| serde_json::from_str(s).ok())
}

/// Body of the first ``` fence (language tag optional)
fn fenced_body(text: &str) -> Option<&str> {
    static FENCE: OnceLock<Option<Regex>> = OnceLock::new();
    FENCE
        .get_or_init(|| Regex::new(r"(?s)```[A-Za-z0-9_-]*[ \t]*\r?\n?(.*?)```").ok())
        .as_ref()?
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// First balanced object or array span that parses, ignoring brackets
/// inside strings
///
/// One pass collects every balanced span; candidates are then tried in
/// order of their opening bracket, so an enclosing span wins over the
/// spans nested in it. A mismatched closer discards the open brackets
/// before it.
fn first_balanced(text: &str) -> Option<&str> {
    let mut open: Vec<(usize, u8)> = Vec::new();
    let mut spans: Vec<(usize, usize)> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in text.as_bytes().iter().enumerate() {
        // Quotes only matter inside a bracketed span
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' if !open.is_empty() => in_string = true,
            b'{' => open.push((i, b'}')),
            b'[' => open.push((i, b']')),
            b'}' | b']' => match open.pop() {
                Some((start, close)) if close == b => spans.push((start, i)),
                Some(_) => open.clear(),
                None => {}
            },
            _ => {}
        }
    }

    spans.sort_unstable_by_key(|&(start, _)| start);
    spans
        .into_iter()
        .map(|(start, end)| &text[start..=end])
        .find(|candidate| serde_json::from_str::<Value>(candidate).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_json() {
        assert_eq!(parse_lenient(r#"{"a": 1}"#), Some(json!({"a": 1})));
        assert_eq!(parse_lenient("  [1, 2]  "), Some(json!([1, 2])));
    }

    #[test]
    fn test_code_fence() {
        let text = "Here you go:\n```json\n{\"title\": \"Fractions\"}\n```\nEnjoy!";
        assert_eq!(parse_lenient(text), Some(json!({"title": "Fractions"})));
    }

    #[test]
    fn test_fence_without_language() {
        let text = "```\n[{\"q\": 1}]\n```";
        assert_eq!(parse_lenient(text), Some(json!([{"q": 1}])));
    }

    #[test]
    fn test_embedded_in_prose() {
        let text = "Sure! The plan is {\"steps\": [\"warm up\", \"practice\"]} as requested.";
        assert_eq!(
            parse_lenient(text),
            Some(json!({"steps": ["warm up", "practice"]}))
        );
    }

    #[test]
    fn test_brackets_inside_strings() {
        let text = r#"Result: {"note": "use } and ] freely", "n": 2} done"#;
        assert_eq!(
            parse_lenient(text),
            Some(json!({"note": "use } and ] freely", "n": 2}))
        );
    }

    #[test]
    fn test_skips_unparseable_span() {
        let text = "[draft] then {\"ok\": true}";
        assert_eq!(parse_lenient(text), Some(json!({"ok": true})));
    }

    #[test]
    fn test_prefers_enclosing_span() {
        let text = r#"Answer: {"unit": [1, 2], "title": "Volume"} thanks"#;
        assert_eq!(
            parse_lenient(text),
            Some(json!({"unit": [1, 2], "title": "Volume"}))
        );
    }

    #[test]
    fn test_nested_span_inside_broken_outer() {
        let text = r#"{ draft: {"ok": true} }"#;
        assert_eq!(parse_lenient(text), Some(json!({"ok": true})));
    }

    #[test]
    fn test_mismatched_closer_resets() {
        let text = r#"[ oops } then {"n": 1}"#;
        assert_eq!(parse_lenient(text), Some(json!({"n": 1})));
    }

    #[test]
    fn test_truncated_reply_is_linear() {
        let started = std::time::Instant::now();
        assert_eq!(parse_lenient(&"[".repeat(200_000)), None);

        let mut cut_off = String::from(r#"{"ok": 1} "#);
        cut_off.push_str(&r#"{"items": ["#.repeat(50_000));
        assert_eq!(parse_lenient(&cut_off), Some(json!({"ok": 1})));

        assert!(started.elapsed() < std::time::Duration::from_secs(5));
    }

    #[test]
    fn test_gives_up() {
        assert_eq!(parse_lenient("no json here"), None);
        assert_eq!(parse_lenient("{ unclosed"), None);
    }
}
