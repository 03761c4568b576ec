//! Tansive Audit — the hash-chained, Ed25519-signed session audit log (C1)
//! and its finalize-time packaging (C12).
//!
//! [`writer::AuditLogWriter`] buffers and seals entries (§4.1);
//! [`writer::verify_hashed_log`] re-verifies a log end to end. The
//! [`package`] module handles the finalize-time Snappy framing and base64
//! envelope a session's log is persisted in (§4.12).

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod canonical_hash;
pub mod entry;
pub mod error;
pub mod package;
pub mod writer;

pub use canonical_hash::sha256_canonical_hex;
pub use entry::LogEntry;
pub use error::{AuditError, AuditResult};
pub use package::{
    decode_and_uncompress_audit_log_file, encode_audit_log_file, is_snappy_framed, package_for_finalize,
    write_audit_log_file, PackagedLog, COMPRESSED_EXTENSION, DEFAULT_COMPRESS_THRESHOLD, RAW_EXTENSION, SNAPPY_FRAME_MAGIC,
};
pub use writer::{verify_hashed_log, AuditLogWriter, DEFAULT_FLUSH_INTERVAL};
