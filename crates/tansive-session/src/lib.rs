//! Tansive Session — the Runtime-side execution core: call graph (C2),
//! PKCE code exchange (C5), the session state machine (C6), and the
//! sandboxed transform chain (C7).
//!
//! A [`session::Session`] is created from an [`session::ExecutionState`]
//! fetched after PKCE redemption, drives skill invocations through
//! [`session::Session::run`], and is torn down by
//! [`session::Session::finalize`]/[`session::Session::stop`].
//! [`session::ActiveSessionManager`] owns every session active in one
//! Runtime process.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod callgraph;
pub mod error;
pub mod pkce;
pub mod session;
pub mod transform;

pub use callgraph::{CallGraph, CallNode};
pub use error::{SessionError, SessionResult};
pub use pkce::{code_challenge_from_verifier, generate_auth_code, generate_code_verifier, AuthCodeGrant, AuthCodeStore, DEFAULT_CODE_TTL_SECS};
pub use session::{
    ActiveSessionManager, CreateSessionParams, ExecutionState, McpProxyRegistrar, RunnerContext, Session, SkillRunner, DEFAULT_MAX_CALL_DEPTH,
};
pub use transform::{run_transform, SkillInvoker, TransformInput, TransformOutput};
