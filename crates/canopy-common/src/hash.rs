//! Content hashes for drift-detection labels
//!
//! Hash values are persisted in object labels, so they must be stable across
//! processes and toolchains. Specs are converted to a `serde_json::Value`,
//! object keys are sorted recursively, and the canonical string form is
//! digested with SHA-256.

use serde::Serialize;
use serde_json::Value;

use crate::Error;

/// Length of a hash label value in hex characters
pub const HASH_LEN: usize = 16;

/// Compute a deterministic hash of the input string, returning a 16-char hex digest.
///
/// Uses truncated SHA-256 for stability across Rust toolchain versions.
pub fn deterministic_hash(input: &str) -> String {
    use aws_lc_rs::digest;
    let hash = digest::digest(&digest::SHA256, input.as_bytes());
    hash.as_ref()
        .iter()
        .take(HASH_LEN / 2)
        .fold(String::with_capacity(HASH_LEN), |mut s, b| {
            use std::fmt::Write;
            let _ = write!(s, "{:02x}", b);
            s
        })
}

/// Hash any serializable spec by its canonical JSON form.
///
/// Two values that serialize to structurally equal JSON produce the same
/// hash regardless of field or map insertion order.
pub fn spec_hash<T: Serialize + ?Sized>(spec: &T) -> Result<String, Error> {
    let value = canonicalize(serde_json::to_value(spec)?);
    let canonical = serde_json::to_string(&value)?;
    Ok(deterministic_hash(&canonical))
}

/// Rebuild every object with its keys in sorted order.
///
/// Holds even when `serde_json` is built with `preserve_order`.
fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, canonicalize(v)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}
