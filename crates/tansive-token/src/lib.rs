//! Tansive Token — Ed25519-signed JWS access/identity tokens (C4).
//!
//! [`TokenService`] mints and validates compact EdDSA JWS tokens carrying
//! the claims table from §4.4, publishes a JWKS document, and tracks
//! revoked `jti`s. View-tenant consistency (§8 scenario S5) is checked
//! separately via [`check_view_tenant`] once the caller has resolved the
//! view a token references, since the catalog/view store sits outside
//! this crate's boundary.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod claims;
pub mod error;
pub mod jwks;
pub mod jws;
pub mod service;

pub use claims::{Claims, TokenUse, AUDIENCE, TOKEN_VERSION};
pub use error::{TokenError, TokenResult};
pub use jwks::{Jwk, JwksDocument};
pub use jws::Token;
pub use service::{check_view_tenant, TokenService, CLOCK_SKEW_SECS, MAX_TOKEN_AGE_SECS};
