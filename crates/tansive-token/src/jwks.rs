//! JWKS document: the public half of the token-signing key, published at
//! `GET /.well-known/jwks.json`.

use serde::{Deserialize, Serialize};
use tansive_crypto::PublicKey;

/// A single OKP/EdDSA JWK entry.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Jwk {
    /// Key type, always `"OKP"` for Ed25519.
    pub kty: &'static str,
    /// The curve, always `"Ed25519"`.
    pub crv: &'static str,
    /// Intended use, always `"sig"`.
    #[serde(rename = "use")]
    pub use_: &'static str,
    /// The signing algorithm, always `"EdDSA"`.
    pub alg: &'static str,
    /// Key id: the hex-encoded short key id.
    pub kid: String,
    /// The public key, base64url-encoded (no padding).
    pub x: String,
}

impl Jwk {
    /// Build a JWK entry from a public key.
    #[must_use]
    pub fn from_public_key(key: &PublicKey) -> Self {
        Self {
            kty: "OKP",
            crv: "Ed25519",
            use_: "sig",
            alg: "EdDSA",
            kid: key.key_id_hex(),
            x: key.to_base64url(),
        }
    }
}

/// A JWKS document: `{"keys": [...]}`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JwksDocument {
    /// The published keys.
    pub keys: Vec<Jwk>,
}

impl JwksDocument {
    /// A document with a single active signing key.
    #[must_use]
    pub fn single(key: &PublicKey) -> Self {
        Self {
            keys: vec![Jwk::from_public_key(key)],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tansive_crypto::KeyPair;

    #[test]
    fn jwk_carries_matching_kid() {
        let key = KeyPair::generate();
        let jwk = Jwk::from_public_key(&key.export_public_key());
        assert_eq!(jwk.kid, key.key_id_hex());
    }
}
