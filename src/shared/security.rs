//! Usage: Secret handling helpers (token masking, JSON redaction, constant-time equality).

use serde_json::Value;
use subtle::ConstantTimeEq;

const MASK_PREFIX_CHARS: usize = 6;
const MASK_SUFFIX_CHARS: usize = 4;
const MASK_SHORT_MAX_STARS: usize = 8;

/// `abcdef...7890` for long values, stars only for short ones.
pub(crate) fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.trim().chars().collect();
    if chars.is_empty() {
        return String::new();
    }
    if chars.len() <= MASK_PREFIX_CHARS + MASK_SUFFIX_CHARS {
        return "*".repeat(chars.len().min(MASK_SHORT_MAX_STARS));
    }

    let prefix: String = chars[..MASK_PREFIX_CHARS].iter().collect();
    let suffix: String = chars[chars.len() - MASK_SUFFIX_CHARS..].iter().collect();
    format!("{prefix}...{suffix}")
}

pub(crate) fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

fn is_sensitive_key(key: &str) -> bool {
    let key_lc = key.trim().to_ascii_lowercase();
    key_lc.contains("token")
        || key_lc.contains("secret")
        || key_lc == "code"
        || key_lc == "authorization"
}

/// Masks every string value whose key looks like a credential, recursively.
pub(crate) fn redact_sensitive_json_fields(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, nested) in map {
                if is_sensitive_key(key) {
                    if let Some(raw) = nested.as_str() {
                        *nested = Value::String(mask_token(raw));
                        continue;
                    }
                }
                redact_sensitive_json_fields(nested);
            }
        }
        Value::Array(items) => items.iter_mut().for_each(redact_sensitive_json_fields),
        _ => {}
    }
}

/// Bounded, redacted snippet of an HTTP error body suitable for logs and error messages.
pub(crate) fn sanitize_body_snippet(body: &str, max_chars: usize) -> String {
    if let Ok(mut value) = serde_json::from_str::<Value>(body) {
        redact_sensitive_json_fields(&mut value);
        if let Ok(encoded) = serde_json::to_string(&value) {
            return encoded.chars().take(max_chars).collect();
        }
    }
    body.chars().take(max_chars).collect()
}
