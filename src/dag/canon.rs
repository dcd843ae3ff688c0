//! Canonical JSON encoder for content addressing and signing payloads.

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CanonError {
    #[error("json encode failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Serialize a value to canonical JSON bytes.
///
/// Canonical rules:
/// - object keys sorted by UTF-8 byte order, recursively
/// - no insignificant whitespace
/// - arrays keep element order; empty arrays encode as `[]`
///
/// Any peer that canonicalizes the same way (sorted keys, compact
/// separators) produces byte-identical output, which is what makes
/// cross-implementation signatures verify.
pub fn to_canon_json_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, CanonError> {
    let value = serde_json::to_value(value)?;
    Ok(serde_json::to_vec(&canon_value(value))?)
}

fn canon_value(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let mut canon = Map::new();
            for (key, value) in entries {
                canon.insert(key, canon_value(value));
            }
            Value::Object(canon)
        }
        Value::Array(values) => Value::Array(values.into_iter().map(canon_value).collect()),
        other => other,
    }
}
