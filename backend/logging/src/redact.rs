//! Log Redaction
//!
//! Scrubs bearer tokens, AWS-style keys, session tokens and phone numbers
//! from strings and credential maps prior to logging.

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

static TELEPHONE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\+?\d{1,3}[-.\s]?)?\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}").unwrap()
});
static BEARER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Bearer\s+[a-zA-Z0-9\-\._~+/]+=*").unwrap());
static ACCESS_KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:AKIA|ASIA)[0-9A-Z]{16}\b").unwrap());
static SECRET_FIELD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)("?(?:secretAccessKey|secretKey|sessionToken|accessToken|idToken)"?\s*[:=]\s*"?)[^",\s}]+"#)
        .unwrap()
});

/// Field names whose values are always masked by [`redact_json`].
const SECRET_KEYS: &[&str] = &[
    "accesskeyid",
    "secretaccesskey",
    "secretkey",
    "sessiontoken",
    "accesstoken",
    "idtoken",
];

/// Redacts sensitive patterns in a string.
pub fn redact_sensitive_data(input: &str) -> String {
    let mut redacted = SECRET_FIELD_RE.replace_all(input, "${1}[REDACTED]").to_string();
    redacted = BEARER_RE.replace_all(&redacted, "[REDACTED_TOKEN]").to_string();
    redacted = ACCESS_KEY_RE.replace_all(&redacted, "[REDACTED_KEY]").to_string();
    redacted = TELEPHONE_RE.replace_all(&redacted, "[REDACTED_PHONE]").to_string();
    redacted
}

/// Copy of `value` with secret-looking fields masked, recursively.
pub fn redact_json(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| {
                    let masked = if SECRET_KEYS.contains(&k.to_ascii_lowercase().as_str()) {
                        Value::String("[REDACTED]".to_string())
                    } else {
                        redact_json(v)
                    };
                    (k.clone(), masked)
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(redact_json).collect()),
        Value::String(s) => Value::String(redact_sensitive_data(s)),
        other => other.clone(),
    }
}
