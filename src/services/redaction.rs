//! Sensitive-value redaction applied before any persistence of tool
//! arguments or agent summaries — logs, events, and operator-visible text
//! all pass through here first.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

pub const REDACTION_MARKER: &str = "[REDACTED]";

/// Argument key fragments treated as sensitive regardless of module metadata.
const SENSITIVE_KEY_HINTS: &[&str] =
    &["to", "recipient", "email", "url", "amount", "password", "token", "secret", "key", "credential"];

fn credential_patterns() -> &'static Vec<Regex> {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"Bearer\s+[A-Za-z0-9\-_.]{10,}",
            r"sk-ant-[A-Za-z0-9_\-]{10,}",
            r"sk-[A-Za-z0-9]{32,}",
            r"ghp_[A-Za-z0-9]{20,}",
            r"xoxb-[A-Za-z0-9\-]{20,}",
            r"eyJ[A-Za-z0-9_\-]+\.[A-Za-z0-9_\-]+\.[A-Za-z0-9_\-]+",
            r"[A-Za-z][A-Za-z0-9+.\-]*://[^\s/]+:[^\s/@]+@",
        ]
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect()
    })
}

/// Whether an argument key should be treated as sensitive by name heuristics.
pub fn is_sensitive_key(key: &str) -> bool {
    let lower = key.to_lowercase();
    SENSITIVE_KEY_HINTS.iter().any(|hint| lower.contains(hint))
}

/// Redact credential-shaped substrings from free text.
pub fn redact_text(text: &str) -> String {
    let mut sanitized = text.to_owned();
    for pattern in credential_patterns() {
        sanitized = pattern.replace_all(&sanitized, REDACTION_MARKER).to_string();
    }
    sanitized
}

/// Redact a tool-args JSON object in place for persistence: sensitive-named
/// keys are masked outright, string values are additionally scanned for
/// credential-shaped patterns.
pub fn redact_args(args: &Value) -> Value {
    match args {
        Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (key, value) in map {
                if is_sensitive_key(key) {
                    out.insert(key.clone(), Value::String(REDACTION_MARKER.to_string()));
                } else {
                    out.insert(key.clone(), redact_args(value));
                }
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(redact_args).collect()),
        Value::String(s) => Value::String(redact_text(s)),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn redacts_sensitive_keys() {
        let args = json!({"to": "owner@example.com", "body": "hello"});
        let redacted = redact_args(&args);
        assert_eq!(redacted["to"], json!(REDACTION_MARKER));
        assert_eq!(redacted["body"], json!("hello"));
    }

    #[test]
    fn redacts_credential_shaped_text() {
        let text = "Authorization: Bearer abcdef0123456789";
        let redacted = redact_text(text);
        assert!(!redacted.contains("abcdef0123456789"));
    }

    #[test]
    fn leaves_non_sensitive_values_untouched() {
        let args = json!({"count": 3, "tags": ["a", "b"]});
        assert_eq!(redact_args(&args), args);
    }
}
