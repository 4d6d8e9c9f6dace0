//! Content-addressed vector identity.
//!
//! A record's base id is the SHA-256 of the canonical serialization of its
//! `{trace_id, timestamp, error_type, service}` tuple, with keys sorted so
//! the digest is independent of field arrival order. Two records agreeing
//! on those four fields collapse to the same identity, which makes
//! re-ingestion overwrite instead of duplicate. There is no secondary
//! dedup pass.

use sha2::{Digest, Sha256};

use crate::models::LogRecord;

/// Compute the content-derived base id shared by all chunks of a record.
pub fn base_id(record: &LogRecord) -> String {
    // Keys in lexicographic order: error_type, service, timestamp, trace_id.
    let mut hasher = Sha256::new();
    hasher.update(b"error_type=");
    hasher.update(record.error_type.as_bytes());
    hasher.update(b"\nservice=");
    hasher.update(record.service.as_bytes());
    hasher.update(b"\ntimestamp=");
    hasher.update(record.timestamp.as_bytes());
    hasher.update(b"\ntrace_id=");
    hasher.update(record.trace_id.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Per-chunk id: base id plus the chunk's 0-based position.
pub fn entry_id(base: &str, chunk_index: usize) -> String {
    format!("{}_{}", base, chunk_index)
}
