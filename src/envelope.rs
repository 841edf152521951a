//! The REST collaborator wraps payloads inconsistently: collections may
//! arrive bare or under a `message`/`data` key, mutation payloads the
//! same, and error text may live in `message`, `error` or `errors`.
//! These helpers unwrap all known shapes, preferring the most specific.

use serde_json::{Map, Value};

const PAYLOAD_KEYS: [&str; 2] = ["message", "data"];
const ERROR_KEYS: [&str; 3] = ["message", "error", "errors"];

/// Unwraps a bulk-fetch body into the record array, accepting a bare
/// array or a `{message: [...]}` / `{data: [...]}` envelope.
pub fn collection(body: &[u8]) -> Result<Vec<Value>, String> {
    let parsed: Value = serde_json::from_slice(body)
        .map_err(|e| format!("failed to parse response body: {e}"))?;

    if let Value::Object(map) = &parsed {
        for key in PAYLOAD_KEYS {
            if let Some(Value::Array(items)) = map.get(key) {
                return Ok(items.clone());
            }
        }
    }
    match parsed {
        Value::Array(items) => Ok(items),
        _ => Err("response body is not a record collection".to_string()),
    }
}

/// Unwraps a mutation response body into the returned record object, if
/// any. Mutation endpoints are allowed to return nothing useful.
#[must_use]
pub fn record(body: &[u8]) -> Option<Map<String, Value>> {
    let parsed: Value = serde_json::from_slice(body).ok()?;
    let map = match parsed {
        Value::Object(map) => map,
        _ => return None,
    };

    for key in PAYLOAD_KEYS {
        if let Some(Value::Object(inner)) = map.get(key) {
            return Some(inner.clone());
        }
    }
    Some(map)
}

/// Extracts a human-readable error from a failure body: `message`,
/// `error` or `errors`, first present wins; otherwise a generic
/// status-code fallback.
#[must_use]
pub fn error_message(body: &[u8], status: u16) -> String {
    if let Ok(Value::Object(map)) = serde_json::from_slice::<Value>(body) {
        for key in ERROR_KEYS {
            if let Some(text) = map.get(key).and_then(error_text) {
                return text;
            }
        }
    }
    status_fallback(status)
}

#[must_use]
pub fn status_fallback(status: u16) -> String {
    format!("request failed with status {status}")
}

fn error_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(error_text).collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join("; "))
            }
        }
        Value::Object(map) => {
            let parts: Vec<String> = map.values().filter_map(error_text).collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join("; "))
            }
        }
        _ => None,
    }
}
