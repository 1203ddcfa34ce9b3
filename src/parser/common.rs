//! Shared parser utilities
//!
//! Text truncation, content flattening and small serde helpers used across
//! the parser modules.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

// ─── Text utilities ──────────────────────────────────────────────────────────

/// Keep at most `max_chars` characters, appending `...` when anything was cut.
pub fn truncate_str(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((end, _)) => format!("{}...", &s[..end]),
        None => s.to_string(),
    }
}

/// First non-empty line, trimmed.
pub fn first_line(s: &str) -> &str {
    s.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or("")
}

/// Basename of a slash-delimited path.
pub fn basename(path: &str) -> &str {
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(path)
}

// ─── Content extraction helpers ──────────────────────────────────────────────

/// Convert a tool result `content` value (string or content-block array) to plain text.
pub fn content_to_string(content: &Value) -> String {
    match content {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(arr) => arr
            .iter()
            .filter_map(|block| match block {
                Value::String(s) => Some(s.clone()),
                _ => match block.get("type").and_then(|t| t.as_str()) {
                    Some("text") => block
                        .get("text")
                        .and_then(|t| t.as_str())
                        .map(|s| s.to_string()),
                    _ => None,
                },
            })
            .collect::<Vec<_>>()
            .join("\n"),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

/// String field lookup on a JSON object.
pub fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(|v| v.as_str()).filter(|s| !s.is_empty())
}

/// Accept either a JSON string or number where an id is expected.
pub fn de_string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

// ─── Tests ───────────────────────────────────────────────────────────────────
