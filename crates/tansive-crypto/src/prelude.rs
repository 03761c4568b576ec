//! Commonly used types for convenient import.
//!
//! `use tansive_crypto::prelude::*;`

pub use crate::{CryptoError, CryptoResult};
pub use crate::{KeyPair, PublicKey};
pub use crate::Signature;
pub use crate::ContentHash;
pub use crate::canonicalize;
