//! Lenient field extraction for restoring saved sessions.
//!
//! Stored state may come from an older build or be partially corrupt. Each
//! field is decoded on its own, so one bad value falls back to its default
//! instead of discarding the whole snapshot.

use serde::de::DeserializeOwned;
use serde_json::Value;

/// Decode `key` from a JSON object, or None if missing or the wrong shape.
pub fn field<T: DeserializeOwned>(value: &Value, key: &str) -> Option<T> {
    let raw = value.get(key)?;
    match serde_json::from_value(raw.clone()) {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::warn!(key, error = %e, "ignoring malformed snapshot field");
            None
        }
    }
}

/// Like `field`, falling back to `default`.
pub fn field_or<T: DeserializeOwned>(value: &Value, key: &str, default: T) -> T {
    field(value, key).unwrap_or(default)
}
