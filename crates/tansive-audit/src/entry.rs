//! Log entry: `{payload, prev_hash, hash, signature}` (§3, §4.1).
//!
//! `hash = SHA256(canonical({payload, prev_hash}))`;
//! `signature = Ed25519(canonical({payload, prev_hash, hash}))`.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tansive_crypto::{canonicalize, KeyPair, PublicKey, Signature};

use crate::canonical_hash::sha256_canonical_hex;
use crate::error::{AuditError, AuditResult};

/// A single hash-chained, Ed25519-signed audit log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// The recorded event, as a JSON-serializable map.
    pub payload: Value,
    /// Hex-encoded hash of the preceding entry. Empty string for the first entry.
    pub prev_hash: String,
    /// Hex-encoded `SHA256(canonical({payload, prev_hash}))`.
    pub hash: String,
    /// Base64-encoded Ed25519 signature over `canonical({payload, prev_hash, hash})`.
    pub signature: String,
}

impl LogEntry {
    /// Hash and sign `payload` chained onto `prev_hash`.
    #[must_use]
    pub fn seal(payload: Value, prev_hash: &str, signing_key: &KeyPair) -> Self {
        let hash = sha256_canonical_hex(&json!({"payload": payload, "prev_hash": prev_hash}));
        let sig_input = canonicalize(&json!({"payload": payload, "prev_hash": prev_hash, "hash": hash}));
        let signature = signing_key.sign(&sig_input);
        Self {
            payload,
            prev_hash: prev_hash.to_string(),
            hash,
            signature: signature.to_base64(),
        }
    }

    /// Recompute `hash` from `payload` and `prev_hash`, independent of the stored value.
    #[must_use]
    pub fn recompute_hash(&self) -> String {
        sha256_canonical_hex(&json!({"payload": self.payload, "prev_hash": self.prev_hash}))
    }

    /// Whether the stored `hash` matches what `payload`/`prev_hash` recompute to.
    #[must_use]
    pub fn hash_matches(&self) -> bool {
        self.recompute_hash() == self.hash
    }

    /// Verify the signature over `canonical({payload, prev_hash, hash})`.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::InvalidSignature`] (with `line: 0`, to be
    /// overwritten by callers scanning a file) if verification fails.
    pub fn verify_signature(&self, public_key: &PublicKey) -> AuditResult<()> {
        let sig_input = canonicalize(&json!({"payload": self.payload, "prev_hash": self.prev_hash, "hash": self.hash}));
        let signature =
            Signature::from_base64(&self.signature).map_err(|_| AuditError::InvalidSignature { line: 0 })?;
        public_key
            .verify(&sig_input, &signature)
            .map_err(|_| AuditError::InvalidSignature { line: 0 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_then_verify_roundtrips() {
        let key = KeyPair::generate();
        let entry = LogEntry::seal(json!({"event": "skill_start"}), "", &key);
        assert!(entry.hash_matches());
        assert!(entry.verify_signature(&key.export_public_key()).is_ok());
    }

    #[test]
    fn tampered_payload_breaks_hash_and_signature() {
        let key = KeyPair::generate();
        let mut entry = LogEntry::seal(json!({"event": "skill_start"}), "", &key);
        entry.payload = json!({"event": "tampered"});
        assert!(!entry.hash_matches());
        assert!(entry.verify_signature(&key.export_public_key()).is_err());
    }

    #[test]
    fn chains_onto_previous_hash() {
        let key = KeyPair::generate();
        let first = LogEntry::seal(json!({"event": "a"}), "", &key);
        let second = LogEntry::seal(json!({"event": "b"}), &first.hash, &key);
        assert_eq!(second.prev_hash, first.hash);
    }

    #[test]
    fn wrong_key_fails_verification() {
        let key = KeyPair::generate();
        let other = KeyPair::generate();
        let entry = LogEntry::seal(json!({"event": "a"}), "", &key);
        assert!(entry.verify_signature(&other.export_public_key()).is_err());
    }
}
