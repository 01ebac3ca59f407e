//! Configuration fingerprinting.
//!
//! The fingerprint is the BLAKE3 digest of the configuration's JSON form.
//! Struct fields serialize in declaration order, so equal configurations
//! always hash equal across runs and platforms.

use serde::Serialize;

/// Hex BLAKE3 digest of `value` serialized as compact JSON.
pub fn config_hash<T: Serialize>(value: &T) -> String {
    // Plain structs with string keys; serialization has no failure path here.
    let json = serde_json::to_vec(value).unwrap_or_default();
    blake3::hash(&json).to_hex().to_string()
}

/// First 12 hex digits, for log lines.
pub fn short(hash: &str) -> &str {
    hash.get(..12).unwrap_or(hash)
}
