//! Envelope unwrapping.
//!
//! Backend versions wrap the real payload in `data`, `result` or `output`.
//! We descend through each key once, in that fixed order, and never recurse
//! further.

use serde_json::{Map, Value};

/// Wrapper keys, checked in order against the current descended value.
pub const ENVELOPE_KEYS: &[&str] = &["data", "result", "output"];

/// Return the inner payload of a decoded response.
///
/// Scalars and `null` become an empty object. Arrays pass through untouched.
pub fn unwrap_envelope(value: &Value) -> Value {
    match value {
        Value::Object(_) | Value::Array(_) => {}
        _ => return Value::Object(Map::new()),
    }

    let mut current = value;
    for key in ENVELOPE_KEYS {
        if let Some(inner @ Value::Object(_)) = current.get(*key) {
            current = inner;
        }
    }
    current.clone()
}
