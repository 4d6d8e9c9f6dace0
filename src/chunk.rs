//! Fixed-template chunk builder.
//!
//! Trades one [`LogRecord`] for 2–3 independently searchable fragments:
//! error identity, service/operational context, and (when present) the raw
//! stack trace. Separate embeddings let similarity search match on
//! whichever dimension a query emphasizes without one long blob diluting
//! relevance.

use crate::models::{Chunk, ChunkKind, LogRecord};

/// Split a record into its searchable fragments.
///
/// Total and deterministic: always yields the `error_description` and
/// `service_context` chunks in that order, followed by a `stack_trace`
/// chunk iff the record carries a non-empty stack trace.
pub fn build_chunks(record: &LogRecord) -> Vec<Chunk> {
    let mut chunks = vec![
        Chunk {
            text: format!(
                "Error Type: {} - Message: {}",
                record.error_type, record.message
            ),
            kind: ChunkKind::ErrorDescription,
        },
        Chunk {
            text: format!(
                "Service: {} - Error Code: {}",
                record.service, record.error_code
            ),
            kind: ChunkKind::ServiceContext,
        },
    ];

    if !record.stack_trace.is_empty() {
        chunks.push(Chunk {
            text: format!("Stack Trace: {}", record.stack_trace),
            kind: ChunkKind::StackTrace,
        });
    }

    chunks
}
