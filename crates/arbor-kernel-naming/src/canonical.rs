//! Canonical JSON and the `stref` wire encoding.
//!
//! Canonical JSON sorts object keys lexicographically at every depth and
//! preserves array order, so two clients encoding equivalent records
//! produce byte-identical strings. References serialize to
//! `stref:v1:<base64url(canonical JSON)>` with the URL-safe, unpadded
//! alphabet.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde_json::Value;

use crate::{NamingError, PersistentRecord};

/// Wire prefix of a persistent reference.
pub const STREF_PREFIX: &str = "stref:v1:";

/// Serialize a JSON value with lexicographically sorted object keys.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            out.push('{');
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String((*key).clone()).to_string());
                out.push(':');
                write_canonical(&map[*key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        other => out.push_str(&other.to_string()),
    }
}

/// Encode a record to its `stref:v1:` wire form.
pub fn encode_persistent_ref(record: &PersistentRecord) -> Result<String, NamingError> {
    let value = serde_json::to_value(record).map_err(|e| NamingError::Encode(e.to_string()))?;
    let canonical = canonical_json(&value);
    Ok(format!(
        "{STREF_PREFIX}{}",
        URL_SAFE_NO_PAD.encode(canonical.as_bytes())
    ))
}

/// Decode a `stref:v1:` string back into a record.
pub fn decode_persistent_ref(s: &str) -> Result<PersistentRecord, NamingError> {
    let payload = s
        .strip_prefix(STREF_PREFIX)
        .ok_or_else(|| NamingError::Decode(format!("missing {STREF_PREFIX} prefix")))?;
    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|e| NamingError::Decode(e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| NamingError::Decode(e.to_string()))
}
