//! Memoization key derivation.
//!
//! Callers wrapping their own functions with `HybridCache::get_or_compute`
//! derive the cache key here so identical arguments always hit the same entry.

use serde::Serialize;
use sha2::{Digest, Sha256};

/// Hex characters of the argument digest kept in the key.
const DIGEST_LEN: usize = 16;

/// Builds `"{namespace}:{function}:{digest}"` for a call of `function` with `args`.
///
/// Arguments are serialized as canonical JSON (object keys sorted), so maps
/// with the same content produce the same key regardless of insertion order.
/// Arguments that cannot be serialized hash as `null`.
pub fn derive_key<A: Serialize + ?Sized>(namespace: &str, function: &str, args: &A) -> String {
    let canonical = serde_json::to_value(args)
        .map(|value| value.to_string())
        .unwrap_or_else(|_| "null".to_string());

    let digest = Sha256::digest(format!("{}:{}", function, canonical).as_bytes());
    let mut hash = hex::encode(digest);
    hash.truncate(DIGEST_LEN);

    format!("{}:{}:{}", namespace, function, hash)
}
