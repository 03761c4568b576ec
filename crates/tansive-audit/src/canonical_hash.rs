//! Canonical hashing for the audit hash chain.
//!
//! The chain's `hash` field is specified as `SHA256(canonical(...))`, distinct
//! from [`tansive_crypto::ContentHash`] (BLAKE3), which this crate does not
//! use for chain linkage — only for general-purpose content hashing
//! elsewhere (e.g. argument hashes in audit payloads).

use sha2::{Digest, Sha256};
use tansive_crypto::canonicalize;

/// `hex(SHA256(canonical(value)))`.
#[must_use]
pub fn sha256_canonical_hex(value: &serde_json::Value) -> String {
    let bytes = canonicalize(value);
    let digest = Sha256::digest(&bytes);
    hex::encode(digest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn is_deterministic_regardless_of_key_order() {
        let a = json!({"b": 1, "a": 2});
        let b = json!({"a": 2, "b": 1});
        assert_eq!(sha256_canonical_hex(&a), sha256_canonical_hex(&b));
    }

    #[test]
    fn differs_for_different_content() {
        assert_ne!(
            sha256_canonical_hex(&json!({"a": 1})),
            sha256_canonical_hex(&json!({"a": 2}))
        );
    }
}
