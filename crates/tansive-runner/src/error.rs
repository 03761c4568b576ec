//! Errors raised by the stdio and MCP runners (C8, C9).

use thiserror::Error;

/// Errors a runner can raise before or during dispatch.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// A source's `config` did not deserialize into the runner's expected shape.
    #[error("invalid source config: {0}")]
    InvalidConfig(String),

    /// `runtime` named something outside `{bash, python, node, npx, npm, binary}`.
    #[error("unsupported runtime: {0}")]
    UnsupportedRuntime(String),

    /// The script path, joined with the trusted script directory, resolved
    /// outside of it (§4.8).
    #[error("script escapes trusted directory: {0}")]
    ScriptEscapesTrustedDirectory(String),

    /// The runtime's backing binary (`bash`, `python3`, `node`, ...) could
    /// not be located on `PATH`.
    #[error("runtime binary not found: {0}")]
    BinaryNotFound(String),

    /// Spawning, writing to, or waiting on the child process failed.
    #[error("execution failed: {0}")]
    ExecutionFailed(String),

    /// The child exited with a non-zero status.
    #[error("child process exited with status {0}")]
    NonZeroExit(i32),

    /// The MCP child process failed to initialize a session.
    #[error("mcp session failed: {0}")]
    McpSessionFailed(String),

    /// A `tools/call` against the MCP child failed at the transport/protocol
    /// level (distinct from a tool-reported error, which surfaces as a
    /// normal `CallToolResult` with `is_error: true`).
    #[error("mcp call failed: {0}")]
    McpCallFailed(String),

    /// I/O failure writing the wrapper script or session `$HOME`.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for runner operations.
pub type RunnerResult<T> = Result<T, RunnerError>;
