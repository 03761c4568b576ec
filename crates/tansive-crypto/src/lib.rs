//! Cryptographic primitives for Tansive.
//!
//! This crate provides:
//! - Ed25519 key pairs with secure memory handling (runtime signing keys,
//!   server token-signing keys)
//! - BLAKE3 content hashing for the audit hash-chain
//! - Canonical JSON encoding for deterministic signing input
//!
//! # Example
//!
//! ```
//! use tansive_crypto::{KeyPair, ContentHash};
//!
//! let keypair = KeyPair::generate();
//! let message = b"important data";
//! let signature = keypair.sign(message);
//! assert!(keypair.verify(message, &signature).is_ok());
//!
//! let hash = ContentHash::hash(message);
//! println!("hash: {}", hash.to_hex());
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod canonical;
mod error;
mod hash;
mod keypair;
mod signature;

pub use canonical::canonicalize;
pub use error::{CryptoError, CryptoResult};
pub use hash::ContentHash;
pub use keypair::{KeyPair, PublicKey};
pub use signature::Signature;
