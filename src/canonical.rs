//! Canonical serialization for hashing and signing.
//!
//! A structured payload must map to exactly one byte sequence: keys sorted
//! lexicographically at every nesting level, minimal separators, UTF-8 without
//! ASCII escaping. Two semantically equal payloads canonicalize identically no
//! matter how they were built. Only these bytes are ever hashed or signed.

use serde::Serialize;

use crate::errors::GateError;

/// Serialize `value` to canonical JSON bytes.
///
/// The value is first lowered to a `serde_json::Value`; with the default
/// (ordered-map) feature set of `serde_json`, object keys land in a `BTreeMap`
/// and compact serialization yields sorted keys with `,`/`:` separators.
pub fn canonical_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, GateError> {
    let value = serde_json::to_value(value)?;
    Ok(serde_json::to_vec(&value)?)
}

/// Canonical bytes as a `String` (always valid UTF-8).
pub fn canonical_string<T: Serialize>(value: &T) -> Result<String, GateError> {
    let bytes = canonical_bytes(value)?;
    String::from_utf8(bytes)
        .map_err(|e| GateError::Validation(format!("non-UTF-8 canonical bytes: {}", e)))
}
