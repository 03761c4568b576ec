//! Tansive Core - foundation types shared across the execution core.
//!
//! This crate provides:
//! - Identifiers for sessions, invocations, tokens, views, and audit entries
//! - `Action` and `ResourceUri`, the atoms the policy evaluator matches over
//! - `Timestamp`, a serde-friendly UTC wrapper
//! - `TansiveError`, the error taxonomy shared by every handler boundary

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod prelude;

pub mod action;
pub mod error;
pub mod ids;
pub mod resource_uri;
pub mod timestamp;

pub use action::{Action, ActionError};
pub use error::{TansiveError, TansiveResult};
pub use ids::{AuditEntryId, InvocationId, SessionId, TokenId, ViewId};
pub use resource_uri::{ResourceUri, ResourceUriError};
pub use timestamp::Timestamp;
