//! Canonical JSON encoding and stable digests.

use edolab_core::errors::{ErrorInfo, LabError};
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Encodes `value` as compact JSON with object keys in sorted order.
///
/// Non-finite floats encode as `null`.
pub fn to_canonical_json_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, LabError> {
    // Going through `Value` sorts keys: its map is ordered by key.
    let value = serde_json::to_value(value).map_err(|err| {
        LabError::Io(ErrorInfo::new("canonical-encode", err.to_string()))
    })?;
    serde_json::to_vec(&value)
        .map_err(|err| LabError::Io(ErrorInfo::new("canonical-encode", err.to_string())))
}

/// Hex SHA-256 of the canonical JSON encoding of `value`.
pub fn stable_hash_string<T: Serialize>(value: &T) -> Result<String, LabError> {
    let bytes = to_canonical_json_bytes(value)?;
    Ok(format!("{:x}", Sha256::digest(bytes)))
}
