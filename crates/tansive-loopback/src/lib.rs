//! Tansive Loopback — the skill-service UDS HTTP surface a running skill
//! child process re-enters the session core through (C10, §4.10).

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod error;
pub mod handlers;
pub mod server;

pub use error::{LoopbackError, LoopbackResult};
pub use handlers::{router, LoopbackState};
pub use server::serve_unix;
