//! Tansive Runner — the stdio (C8) and MCP stdio (C9) skill runners, plus
//! the MCP proxy-session registry that backs `/session/<rand>/mcp`.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod error;
pub mod mcp;
pub mod stdio;

pub use error::{RunnerError, RunnerResult};
pub use mcp::{McpProxyRegistry, McpProxySession, McpRunner, McpStdioConfig};
pub use stdio::{RuntimeKind, SecurityType, StdioConfig, StdioRunner};
