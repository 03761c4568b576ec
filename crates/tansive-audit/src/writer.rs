//! Hash-chain log writer (C1): buffered, single-writer-locked, append-only.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde_json::Value;
use tansive_crypto::{KeyPair, PublicKey};

use crate::entry::LogEntry;
use crate::error::{AuditError, AuditResult};

/// Default number of buffered entries before an automatic flush.
pub const DEFAULT_FLUSH_INTERVAL: usize = 16;

struct WriterState {
    file: Option<File>,
    prev_hash: String,
    pending: Vec<Value>,
    failed: bool,
    closed: bool,
}

/// Append-only, hash-chained, Ed25519-signed session audit log.
///
/// `AddEntry` buffers raw payloads; once the buffer reaches `flush_interval`
/// entries (or [`Self::flush`]/[`Self::close`] is called), all pending
/// entries are canonicalized, hashed, signed, NDJSON-encoded, and written in
/// a single `write` call under the internal lock — preserving total
/// ordering within the session.
pub struct AuditLogWriter {
    signing_key: KeyPair,
    flush_interval: usize,
    path: PathBuf,
    state: Mutex<WriterState>,
}

impl AuditLogWriter {
    /// Open (creating if absent) the log file at `path` with mode `0644`.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Io`] if the parent directory does not exist or
    /// the file cannot be opened.
    pub fn open(path: impl AsRef<Path>, signing_key: KeyPair, flush_interval: usize) -> AuditResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                return Err(AuditError::Io(format!("parent directory does not exist: {}", parent.display())));
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(std::fs::Permissions::from_mode(0o644))?;
        }

        Ok(Self {
            signing_key,
            flush_interval: flush_interval.max(1),
            path: path.to_path_buf(),
            state: Mutex::new(WriterState {
                file: Some(file),
                prev_hash: String::new(),
                pending: Vec::new(),
                failed: false,
                closed: false,
            }),
        })
    }

    /// The path this writer is appending to.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The public half of the signing key, to be persisted as the session's
    /// "verification key".
    #[must_use]
    pub fn public_key(&self) -> PublicKey {
        self.signing_key.export_public_key()
    }

    /// Buffer `payload`, flushing once `flush_interval` entries have accumulated.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::WriterFailed`] or [`AuditError::AlreadyClosed`]
    /// if the writer is unusable, or an I/O error if an automatic flush fails.
    pub fn add_entry(&self, payload: Value) -> AuditResult<()> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        Self::check_usable(&state)?;
        state.pending.push(payload);
        if state.pending.len() >= self.flush_interval {
            Self::drain(&mut state, &self.signing_key)?;
        }
        Ok(())
    }

    /// Force a drain of any buffered entries.
    ///
    /// # Errors
    ///
    /// See [`Self::add_entry`].
    pub fn flush(&self) -> AuditResult<()> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        Self::check_usable(&state)?;
        Self::drain(&mut state, &self.signing_key)
    }

    /// Flush and close the file. Idempotent — a second call is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the final flush fails.
    pub fn close(&self) -> AuditResult<()> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.closed {
            return Ok(());
        }
        let result = Self::drain(&mut state, &self.signing_key);
        state.file = None;
        state.closed = true;
        result
    }

    fn check_usable(state: &WriterState) -> AuditResult<()> {
        if state.failed {
            return Err(AuditError::WriterFailed);
        }
        if state.closed {
            return Err(AuditError::AlreadyClosed);
        }
        Ok(())
    }

    fn drain(state: &mut WriterState, signing_key: &KeyPair) -> AuditResult<()> {
        if state.pending.is_empty() {
            return Ok(());
        }

        let mut buf = String::new();
        let mut prev_hash = state.prev_hash.clone();
        for payload in state.pending.drain(..) {
            let entry = LogEntry::seal(payload, &prev_hash, signing_key);
            prev_hash = entry.hash.clone();
            let line = serde_json::to_string(&entry).map_err(|e| AuditError::Serialization(e.to_string()))?;
            buf.push_str(&line);
            buf.push('\n');
        }

        let Some(file) = state.file.as_mut() else {
            state.failed = true;
            return Err(AuditError::AlreadyClosed);
        };

        if let Err(err) = file.write_all(buf.as_bytes()).and_then(|()| file.flush()) {
            state.failed = true;
            return Err(AuditError::Io(err.to_string()));
        }

        state.prev_hash = prev_hash;
        Ok(())
    }
}

/// Scan a hash-chained log, recomputing hashes and verifying signatures in order.
///
/// Fails at the first mismatch, reporting the 1-indexed line number.
///
/// # Errors
///
/// Returns [`AuditError::ChainBroken`] or [`AuditError::InvalidSignature`] at
/// the first offending line, or [`AuditError::Serialization`]/[`AuditError::Io`]
/// on malformed input.
pub fn verify_hashed_log<R: BufRead>(reader: R, public_key: &PublicKey) -> AuditResult<usize> {
    let mut expected_prev = String::new();
    let mut count = 0usize;

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let line_no = idx + 1;
        let entry: LogEntry = serde_json::from_str(&line).map_err(|e| AuditError::Serialization(e.to_string()))?;

        if entry.prev_hash != expected_prev {
            return Err(AuditError::ChainBroken {
                line: line_no,
                reason: "prev_hash does not match preceding entry".to_string(),
            });
        }
        if !entry.hash_matches() {
            return Err(AuditError::ChainBroken {
                line: line_no,
                reason: "hash does not match canonical(payload, prev_hash)".to_string(),
            });
        }
        entry
            .verify_signature(public_key)
            .map_err(|_| AuditError::InvalidSignature { line: line_no })?;

        expected_prev = entry.hash;
        count += 1;
    }

    Ok(count)
}
