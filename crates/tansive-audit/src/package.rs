//! Audit-log packaging (C12): framed Snappy compression + base64 envelope
//! for transporting and persisting a finalized session log.

use std::io::{Read, Write};
use std::path::Path;

use base64::Engine;

use crate::error::{AuditError, AuditResult};

/// The framed Snappy stream identifier chunk: `ff 06 00 00 'sNaPpY'`.
pub const SNAPPY_FRAME_MAGIC: [u8; 10] = [0xff, 0x06, 0x00, 0x00, b's', b'N', b'a', b'P', b'p', b'Y'];

/// Default size threshold above which a raw log is compressed on finalize.
pub const DEFAULT_COMPRESS_THRESHOLD: usize = 64 * 1024;

/// Extension to use for a raw (uncompressed) NDJSON log.
pub const RAW_EXTENSION: &str = "tlog";

/// Extension to use for a framed-Snappy-compressed log.
pub const COMPRESSED_EXTENSION: &str = "ztlog";

/// Exact-magic-prefix test for framed Snappy data.
#[must_use]
pub fn is_snappy_framed(bytes: &[u8]) -> bool {
    bytes.starts_with(&SNAPPY_FRAME_MAGIC)
}

/// The bytes and extension to persist for a finalized session log.
#[derive(Debug, Clone)]
pub struct PackagedLog {
    /// The bytes to write to disk / catalog storage.
    pub bytes: Vec<u8>,
    /// `"tlog"` or `"ztlog"`, matching the content of `bytes`.
    pub extension: &'static str,
}

/// Package a finalized raw log: pass through already-framed content,
/// otherwise compress logs at or above `threshold`.
#[must_use]
pub fn package_for_finalize(raw: &[u8], threshold: usize) -> PackagedLog {
    if is_snappy_framed(raw) {
        return PackagedLog {
            bytes: raw.to_vec(),
            extension: COMPRESSED_EXTENSION,
        };
    }

    if raw.len() >= threshold {
        let mut encoder = snap::write::FrameEncoder::new(Vec::new());
        // A `Vec<u8>` sink never fails to write.
        encoder.write_all(raw).expect("compressing into an in-memory buffer cannot fail");
        let compressed = encoder.into_inner().expect("flushing an in-memory frame encoder cannot fail");
        return PackagedLog {
            bytes: compressed,
            extension: COMPRESSED_EXTENSION,
        };
    }

    PackagedLog {
        bytes: raw.to_vec(),
        extension: RAW_EXTENSION,
    }
}

fn uncompress_if_framed(bytes: &[u8]) -> AuditResult<Vec<u8>> {
    if !is_snappy_framed(bytes) {
        return Ok(bytes.to_vec());
    }
    let mut decoder = snap::read::FrameDecoder::new(bytes);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out).map_err(|e| AuditError::Io(e.to_string()))?;
    Ok(out)
}

/// Read the session log at `path`, package it, and base64-encode the result.
///
/// # Errors
///
/// Returns [`AuditError::Io`] if the file cannot be read.
pub fn encode_audit_log_file(path: impl AsRef<Path>, threshold: usize) -> AuditResult<String> {
    let raw = std::fs::read(path)?;
    let packaged = package_for_finalize(&raw, threshold);
    Ok(base64::engine::general_purpose::STANDARD.encode(packaged.bytes))
}

/// Decode a base64 audit log payload, uncompressing it if framed, and write
/// the raw NDJSON bytes to `path`.
///
/// # Errors
///
/// Returns [`AuditError::InvalidBase64`] on malformed input, or
/// [`AuditError::Io`] if decompression or the write fails.
pub fn decode_and_uncompress_audit_log_file(b64: &str, path: impl AsRef<Path>) -> AuditResult<()> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(b64)
        .map_err(|e| AuditError::InvalidBase64(e.to_string()))?;
    let raw = uncompress_if_framed(&bytes)?;
    std::fs::write(path, raw)?;
    Ok(())
}

/// Decode a base64 audit log payload and write it verbatim (no
/// decompression) to `path` — the inverse used to transport an already
/// packaged log from Runtime to Server.
///
/// # Errors
///
/// Returns [`AuditError::InvalidBase64`] on malformed input, or
/// [`AuditError::Io`] if the write fails.
pub fn write_audit_log_file(b64: &str, path: impl AsRef<Path>) -> AuditResult<()> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(b64)
        .map_err(|e| AuditError::InvalidBase64(e.to_string()))?;
    std::fs::write(path, bytes)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_log_stays_uncompressed() {
        let raw = b"{\"event\":\"a\"}\n";
        let packaged = package_for_finalize(raw, DEFAULT_COMPRESS_THRESHOLD);
        assert_eq!(packaged.extension, RAW_EXTENSION);
        assert_eq!(packaged.bytes, raw);
    }

    #[test]
    fn large_log_is_framed_compressed() {
        let raw = "{\"event\":\"a\"}\n".repeat(10_000);
        let packaged = package_for_finalize(raw.as_bytes(), 1024);
        assert_eq!(packaged.extension, COMPRESSED_EXTENSION);
        assert!(is_snappy_framed(&packaged.bytes));
    }

    #[test]
    fn already_framed_input_passes_through() {
        let raw = "{\"event\":\"a\"}\n".repeat(10_000);
        let once = package_for_finalize(raw.as_bytes(), 1024);
        let twice = package_for_finalize(&once.bytes, 1024);
        assert_eq!(twice.extension, COMPRESSED_EXTENSION);
        assert_eq!(twice.bytes, once.bytes);
    }

    #[test]
    fn encode_then_decode_roundtrips_for_compressed_and_raw() {
        let dir = tempfile::tempdir().unwrap();

        let small_path = dir.path().join("small.tlog");
        std::fs::write(&small_path, b"{\"event\":\"a\"}\n").unwrap();
        let small_b64 = encode_audit_log_file(&small_path, DEFAULT_COMPRESS_THRESHOLD).unwrap();
        let small_out = dir.path().join("small.out");
        decode_and_uncompress_audit_log_file(&small_b64, &small_out).unwrap();
        assert_eq!(std::fs::read(&small_out).unwrap(), std::fs::read(&small_path).unwrap());

        let large_path = dir.path().join("large.tlog");
        let large_raw = "{\"event\":\"a\"}\n".repeat(10_000);
        std::fs::write(&large_path, &large_raw).unwrap();
        let large_b64 = encode_audit_log_file(&large_path, 1024).unwrap();
        let large_out = dir.path().join("large.out");
        decode_and_uncompress_audit_log_file(&large_b64, &large_out).unwrap();
        assert_eq!(std::fs::read_to_string(&large_out).unwrap(), large_raw);
    }

    #[test]
    fn write_audit_log_file_does_not_uncompress() {
        let dir = tempfile::tempdir().unwrap();
        let raw = "{\"event\":\"a\"}\n".repeat(10_000);
        let packaged = package_for_finalize(raw.as_bytes(), 1024);
        let b64 = base64::engine::general_purpose::STANDARD.encode(&packaged.bytes);

        let out = dir.path().join("transported.ztlog");
        write_audit_log_file(&b64, &out).unwrap();
        assert!(is_snappy_framed(&std::fs::read(&out).unwrap()));
    }
}
