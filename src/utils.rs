//! Utility functions for logging, text splitting and JSON error classification.

use chrono::{SecondsFormat, Utc};
use url::Url;

/// Truncate a string for logging purposes.
///
/// Long strings are cut to at most `max` bytes (backing off to the previous
/// char boundary) with an ellipsis and byte count indicator appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}

/// Detect if a serde_json error indicates truncated/incomplete JSON.
///
/// When the model's reply is cut off by its token limit the JSON ends early
/// and fails with an EOF error.
pub fn looks_truncated(e: &serde_json::Error) -> bool {
    use serde_json::error::Category;
    matches!(e.classify(), Category::Eof)
}

/// Split `text` into consecutive pieces of at most `size` chars.
///
/// Splits fall on char boundaries, so multi-byte text is never cut inside a
/// code point, and the pieces concatenate back to exactly `text`.
pub fn split_chars(text: &str, size: usize) -> Vec<&str> {
    assert!(size > 0, "chunk size must be positive");
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut count = 0;
    for (idx, _) in text.char_indices() {
        if count == size {
            pieces.push(&text[start..idx]);
            start = idx;
            count = 0;
        }
        count += 1;
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces
}

/// Resolve `path` against an API base URL, keeping the base's own path.
///
/// `endpoint("https://api.openai.com/v1", "chat/completions")` gives
/// `https://api.openai.com/v1/chat/completions`; a plain `Url::join` would
/// drop the `v1` segment.
pub fn endpoint(base: &str, path: &str) -> Result<Url, url::ParseError> {
    let mut base = Url::parse(base)?;
    if !base.path().ends_with('/') {
        let with_slash = format!("{}/", base.path());
        base.set_path(&with_slash);
    }
    base.join(path.trim_start_matches('/'))
}

/// Current UTC time as an RFC 3339 string, for the end-of-run log line.
pub fn utc_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_for_log_short_string() {
        let s = "Hello, world!";
        assert_eq!(truncate_for_log(s, 100), "Hello, world!");
    }

    #[test]
    fn test_truncate_for_log_long_string() {
        let s = "a".repeat(500);
        let result = truncate_for_log(&s, 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(result.contains("…(+400 bytes)"));
    }

    #[test]
    fn test_truncate_for_log_multibyte() {
        // 'é' is two bytes; byte 3 falls inside the second one.
        let result = truncate_for_log("éééé", 3);
        assert_eq!(result, "é…(+6 bytes)");
    }

    #[test]
    fn test_looks_truncated() {
        let json_eof = r#"{"field": "value"#;
        let err = serde_json::from_str::<serde_json::Value>(json_eof).unwrap_err();
        assert!(looks_truncated(&err));

        let err = serde_json::from_str::<serde_json::Value>("{]").unwrap_err();
        assert!(!looks_truncated(&err));
    }

    #[test]
    fn test_split_chars_exact_multiple() {
        let pieces = split_chars("abcdef", 3);
        assert_eq!(pieces, vec!["abc", "def"]);
    }

    #[test]
    fn test_split_chars_remainder() {
        let pieces = split_chars("abcdefg", 3);
        assert_eq!(pieces, vec!["abc", "def", "g"]);
    }

    #[test]
    fn test_split_chars_multibyte_roundtrip() {
        let text = "日本語のテキスト🙂".repeat(300);
        let pieces = split_chars(&text, 1999);
        assert!(pieces.iter().all(|p| p.chars().count() <= 1999));
        assert_eq!(pieces.concat(), text);
        assert_eq!(pieces.len(), text.chars().count().div_ceil(1999));
    }

    #[test]
    fn test_split_chars_empty() {
        assert!(split_chars("", 10).is_empty());
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let url = endpoint("https://api.openai.com/v1", "chat/completions").unwrap();
        assert_eq!(url.as_str(), "https://api.openai.com/v1/chat/completions");

        let url = endpoint("https://api.notion.com/v1/", "/pages").unwrap();
        assert_eq!(url.as_str(), "https://api.notion.com/v1/pages");
    }

    #[test]
    fn test_endpoint_rejects_garbage_base() {
        assert!(endpoint("not a url", "pages").is_err());
    }

    #[test]
    fn test_utc_timestamp_is_rfc3339() {
        let ts = utc_timestamp();
        assert!(chrono::DateTime::parse_from_rfc3339(&ts).is_ok());
        assert!(ts.ends_with('Z'));
    }
}
