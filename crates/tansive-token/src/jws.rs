//! Compact JWS (EdDSA) serialization: `base64url(header).base64url(payload).base64url(sig)`.

use base64::Engine;
use serde::{Deserialize, Serialize};
use tansive_crypto::{KeyPair, PublicKey, Signature};

use crate::claims::Claims;
use crate::error::{TokenError, TokenResult};

fn b64(bytes: &[u8]) -> String {
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

fn unb64(s: &str) -> TokenResult<Vec<u8>> {
    base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(s)
        .map_err(|e| TokenError::Malformed(e.to_string()))
}

#[derive(Serialize, Deserialize)]
struct Header {
    alg: &'static str,
    typ: &'static str,
    kid: String,
}

/// A compact-serialized, signed token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token(String);

impl Token {
    /// Sign `claims` with `key`, producing a compact JWS string.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Malformed`] if `claims` fails to serialize
    /// (never happens for well-formed [`Claims`]).
    pub fn sign(claims: &Claims, key: &KeyPair) -> TokenResult<Self> {
        let header = Header {
            alg: "EdDSA",
            typ: "JWT",
            kid: key.key_id_hex(),
        };
        let header_b64 = b64(&serde_json::to_vec(&header).map_err(|e| TokenError::Malformed(e.to_string()))?);
        let payload_b64 = b64(&serde_json::to_vec(claims).map_err(|e| TokenError::Malformed(e.to_string()))?);
        let signing_input = format!("{header_b64}.{payload_b64}");
        let signature = key.sign(signing_input.as_bytes());
        Ok(Self(format!("{signing_input}.{}", b64(signature.as_bytes()))))
    }

    /// The compact serialization.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Wrap an already-serialized compact string (e.g. from an
    /// `Authorization: Bearer` header) for verification.
    #[must_use]
    pub fn from_compact(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Verify the signature and decode the claims, without checking
    /// expiry/issuer/audience/revocation — see [`crate::service::TokenService::validate`]
    /// for the full validation pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Malformed`] if the compact form is not
    /// three base64url segments with a JSON payload, or
    /// [`TokenError::InvalidSignature`] if the signature does not verify.
    pub fn decode_and_verify(&self, public_key: &PublicKey) -> TokenResult<Claims> {
        let mut parts = self.0.split('.');
        let (Some(header_b64), Some(payload_b64), Some(sig_b64), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(TokenError::Malformed("expected 3 segments".into()));
        };

        let signature = Signature::from_base64(sig_b64).map_err(|e| TokenError::Malformed(e.to_string()))?;
        let signing_input = format!("{header_b64}.{payload_b64}");
        public_key
            .verify(signing_input.as_bytes(), &signature)
            .map_err(|_| TokenError::InvalidSignature)?;

        let payload_bytes = unb64(payload_b64)?;
        serde_json::from_slice(&payload_bytes).map_err(|e| TokenError::Malformed(e.to_string()))
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::{TokenUse, AUDIENCE, TOKEN_VERSION};
    use uuid::Uuid;

    fn sample_claims() -> Claims {
        Claims {
            view_id: Some(Uuid::new_v4()),
            tenant_id: "tenant-1".into(),
            iss: "localhost:8443".into(),
            aud: AUDIENCE.into(),
            jti: Uuid::new_v4(),
            iat: 1_000,
            exp: 1_300,
            ver: TOKEN_VERSION.into(),
            token_use: TokenUse::Access,
            sub: Claims::subject_for_session(Uuid::new_v4()),
        }
    }

    #[test]
    fn sign_then_verify_roundtrips_claims() {
        let key = KeyPair::generate();
        let claims = sample_claims();
        let token = Token::sign(&claims, &key).unwrap();
        let decoded = token.decode_and_verify(&key.export_public_key()).unwrap();
        assert_eq!(decoded.tenant_id, claims.tenant_id);
        assert_eq!(decoded.jti, claims.jti);
    }

    #[test]
    fn rejects_wrong_key() {
        let key = KeyPair::generate();
        let other = KeyPair::generate();
        let token = Token::sign(&sample_claims(), &key).unwrap();
        assert!(matches!(
            token.decode_and_verify(&other.export_public_key()),
            Err(TokenError::InvalidSignature)
        ));
    }

    #[test]
    fn rejects_tampered_payload() {
        let key = KeyPair::generate();
        let token = Token::sign(&sample_claims(), &key).unwrap();
        let mut segments: Vec<&str> = token.as_str().split('.').collect();
        let tampered_payload = b64(br#"{"tenant_id":"evil"}"#);
        segments[1] = &tampered_payload;
        let tampered = Token(segments.join("."));
        assert!(tampered.decode_and_verify(&key.export_public_key()).is_err());
    }
}
