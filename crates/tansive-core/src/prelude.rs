//! Commonly used types for convenient import.
//!
//! `use tansive_core::prelude::*;`

pub use crate::action::{Action, ActionError, SYSTEM_ACTIONS};
pub use crate::error::{TansiveError, TansiveResult};
pub use crate::ids::{AuditEntryId, InvocationId, SessionId, TokenId, ViewId};
pub use crate::resource_uri::{ResourceUri, ResourceUriError, KNOWN_RESOURCE_KINDS};
pub use crate::timestamp::Timestamp;
