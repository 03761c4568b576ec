//! Stdio runner (C8, §4.8): sandboxed child-process execution of a skill's
//! declared script under the runtime named by its source config.
//!
//! Grounded in the teacher's `BashTool::run_bash` (`astrid-tools::bash`) for
//! the `tokio::process::Command` shape, generalized from "always bash" to
//! the spec's closed runtime enumeration and wrapped in a `set -euo
//! pipefail` launcher script per §4.8.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tansive_core::SessionId;
use tansive_session::{RunnerContext, SkillRunner};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

use crate::error::{RunnerError, RunnerResult};

/// Script extensions CRLF-normalized before execution (§4.8).
const NORMALIZED_EXTENSIONS: &[&str] = &["sh", "bash", "zsh", "ksh", "py", "js", "ts", "rb", "pl", "php"];

/// `security.type` — sandboxed currently defers to default execution
/// (§4.8, §9 "implementers MAY add containerization later").
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SecurityType {
    /// Run directly under the configured runtime, no extra isolation.
    #[default]
    Default,
    /// Declared but not yet implemented; behaves as [`SecurityType::Default`].
    Sandboxed,
}

/// The closed runtime enumeration a stdio source may declare (§4.8).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeKind {
    /// `bash <script> <args>`.
    Bash,
    /// `python3 <script> <args>`.
    Python,
    /// `node <script> <args>`.
    Node,
    /// `npx <script> <args>`.
    Npx,
    /// `npm <script> <args>`.
    Npm,
    /// The script itself is an executable binary.
    Binary,
}

impl RuntimeKind {
    /// The command name resolved via `PATH` to invoke this runtime, or
    /// `None` for [`RuntimeKind::Binary`] (the script is the executable).
    fn command_name(self) -> Option<&'static str> {
        match self {
            Self::Bash => Some("bash"),
            Self::Python => Some("python3"),
            Self::Node => Some("node"),
            Self::Npx => Some("npx"),
            Self::Npm => Some("npm"),
            Self::Binary => None,
        }
    }
}

/// `Source.config` shape for a `RunnerKind::Stdio` source (§4.8).
#[derive(Clone, Debug, Deserialize)]
pub struct StdioConfig {
    /// Semver-ish version this script was authored against.
    pub version: String,
    /// The runtime to invoke the script under.
    pub runtime: RuntimeKind,
    /// Script path, relative to the runner's trusted script directory.
    pub script: String,
    /// Extra environment variables layered onto the process env + `HOME`.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// `default` or `sandboxed` (§4.8).
    #[serde(default)]
    pub security: SecurityType,
}

/// The stdio skill runner: validates, wraps, and executes one child process
/// per invocation.
pub struct StdioRunner {
    trusted_script_dir: PathBuf,
    tmp_root: PathBuf,
    runner_version: String,
}

impl StdioRunner {
    /// Build a runner rooted at `trusted_script_dir` (scripts may never
    /// resolve outside of it) with per-session `$TMPDIR/<session_id>` homes
    /// created under `tmp_root`.
    #[must_use]
    pub fn new(trusted_script_dir: impl Into<PathBuf>, tmp_root: impl Into<PathBuf>, runner_version: impl Into<String>) -> Self {
        Self {
            trusted_script_dir: trusted_script_dir.into(),
            tmp_root: tmp_root.into(),
            runner_version: runner_version.into(),
        }
    }

    /// Join `script` onto the trusted directory and verify the result does
    /// not escape it, without requiring the path to exist ("prefix check
    /// after Clean", §4.8).
    fn resolve_script_path(&self, script: &str) -> RunnerResult<PathBuf> {
        let cleaned = clean_path(&self.trusted_script_dir.join(script));
        let root = clean_path(&self.trusted_script_dir);
        if !cleaned.starts_with(&root) {
            return Err(RunnerError::ScriptEscapesTrustedDirectory(script.to_string()));
        }
        Ok(cleaned)
    }

    fn validate(&self, config: &StdioConfig) -> RunnerResult<PathBuf> {
        if !semver_major_compatible(&config.version, &self.runner_version) {
            return Err(RunnerError::InvalidConfig(format!(
                "script version {} is not compatible with runner version {}",
                config.version, self.runner_version
            )));
        }
        self.resolve_script_path(&config.script)
    }

    async fn prepare_home(&self, session_id: SessionId) -> RunnerResult<PathBuf> {
        let home = self.tmp_root.join(session_id.as_uuid().to_string());
        tokio::fs::create_dir_all(&home).await?;
        Ok(home)
    }

    /// Stage a copy of `script_path` into `home`, normalizing CRLF→LF when
    /// the extension warrants it; best-effort, falls back to a verbatim
    /// copy if the read or normalized write fails.
    async fn stage_script(&self, script_path: &Path, home: &Path) -> RunnerResult<PathBuf> {
        let file_name = script_path
            .file_name()
            .ok_or_else(|| RunnerError::InvalidConfig("script path has no file name".into()))?;
        let staged = home.join(file_name);

        let ext = script_path.extension().and_then(|e| e.to_str()).unwrap_or("");
        if NORMALIZED_EXTENSIONS.contains(&ext) {
            if let Ok(contents) = tokio::fs::read(script_path).await {
                let normalized = normalize_crlf(&contents);
                if tokio::fs::write(&staged, &normalized).await.is_ok() {
                    set_executable(&staged).await;
                    return Ok(staged);
                }
            }
        }

        tokio::fs::copy(script_path, &staged).await?;
        set_executable(&staged).await;
        Ok(staged)
    }

    fn wrapper_source(runtime: RuntimeKind, runtime_cmd: &str, script_path: &Path, args_json: &str) -> String {
        let escaped_args = shell_single_quote(args_json);
        let escaped_script = shell_single_quote(&script_path.display().to_string());
        match runtime {
            RuntimeKind::Binary => format!("#!/bin/sh\nset -euo pipefail\nexec {escaped_script} {escaped_args}\n"),
            _ => format!("#!/bin/sh\nset -euo pipefail\nexec {runtime_cmd} {escaped_script} {escaped_args}\n"),
        }
    }

    async fn dispatch(&self, ctx: RunnerContext<'_>) -> RunnerResult<Value> {
        let config: StdioConfig =
            serde_json::from_value(ctx.source.config.clone()).map_err(|e| RunnerError::InvalidConfig(e.to_string()))?;
        let script_path = self.validate(&config)?;

        let runtime_cmd = match config.runtime.command_name() {
            Some(name) => which::which(name)
                .map(|p| p.display().to_string())
                .map_err(|_| RunnerError::BinaryNotFound(name.to_string()))?,
            None => String::new(),
        };

        let home = self.prepare_home(ctx.session_id).await?;
        let staged_script = self.stage_script(&script_path, &home).await?;

        let args_json = serde_json::to_string(&ctx.args).map_err(|e| RunnerError::InvalidConfig(e.to_string()))?;
        let wrapper_path = home.join("run.sh");
        tokio::fs::write(&wrapper_path, Self::wrapper_source(config.runtime, &runtime_cmd, &staged_script, &args_json)).await?;
        set_executable(&wrapper_path).await;

        let mut command = Command::new(&wrapper_path);
        command
            .env_clear()
            .envs(std::env::vars())
            .envs(&config.env)
            .env("HOME", &home)
            .current_dir(&home)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = command.spawn().map_err(|e| RunnerError::ExecutionFailed(e.to_string()))?;
        let stdout = child.stdout.take().expect("stdout was piped");
        let stderr = child.stderr.take().expect("stderr was piped");

        let session_id = ctx.session_id;
        let stdout_task = tokio::spawn(drain_lines(stdout, "stdout", session_id));
        let stderr_task = tokio::spawn(drain_lines(stderr, "stderr", session_id));

        let status = child.wait().await.map_err(|e| RunnerError::ExecutionFailed(e.to_string()))?;
        let stdout_lines = stdout_task.await.unwrap_or_default();
        let _stderr_lines = stderr_task.await.unwrap_or_default();

        if !status.success() {
            return Err(RunnerError::NonZeroExit(status.code().unwrap_or(-1)));
        }

        Ok(parse_skill_output(&stdout_lines.join("\n")))
    }
}

#[async_trait]
impl SkillRunner for StdioRunner {
    async fn run(&self, ctx: RunnerContext<'_>) -> Result<Value, String> {
        self.dispatch(ctx).await.map_err(|e| e.to_string())
    }
}

async fn drain_lines<R: tokio::io::AsyncRead + Unpin>(reader: R, stream: &'static str, session_id: SessionId) -> Vec<String> {
    let mut lines = Vec::new();
    let mut reader = BufReader::new(reader).lines();
    while let Ok(Some(line)) = reader.next_line().await {
        tracing::debug!(%session_id, stream, %line, "stdio child output");
        lines.push(line);
    }
    lines
}

fn parse_skill_output(text: &str) -> Value {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    serde_json::from_str(trimmed).unwrap_or_else(|_| Value::String(trimmed.to_string()))
}

/// Lexically resolve `.`/`..` components without touching the filesystem
/// (Go's `filepath.Clean`, which §4.8's "prefix check after Clean" refers
/// to, has the same no-syscall contract).
fn clean_path(path: &Path) -> PathBuf {
    use std::path::Component;
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                out.pop();
            }
            Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn normalize_crlf(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\r' && bytes.get(i + 1) == Some(&b'\n') {
            out.push(b'\n');
            i += 2;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    out
}

fn shell_single_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\\''"))
}

async fn set_executable(path: &Path) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Ok(meta) = tokio::fs::metadata(path).await {
            let mut perms = meta.permissions();
            perms.set_mode(0o700);
            let _ = tokio::fs::set_permissions(path, perms).await;
        }
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
}

/// Accept scripts whose major version matches the runner's; the spec only
/// requires "semver-compatible", which for a single-binary runner reduces
/// to agreement on the major component.
fn semver_major_compatible(script_version: &str, runner_version: &str) -> bool {
    let major = |v: &str| v.split('.').next().unwrap_or(v).to_string();
    major(script_version) == major(runner_version)
}
