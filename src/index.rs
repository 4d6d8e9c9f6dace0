//! Ingestion: records → chunks → identified, metadata-bearing vector
//! entries → batched upserts.
//!
//! Batches are aligned to record boundaries: one record's chunk group is
//! always written within a single batch, so a batch failure never leaves a
//! record half-indexed. Across batches the write is at-least-once and
//! non-atomic: a failed batch surfaces the store's error and earlier
//! batches stay committed; re-running converges because ids are
//! content-derived.

use std::sync::Arc;

use anyhow::Result;
use chrono::{SecondsFormat, Utc};
use tracing::debug;

use crate::chunk::build_chunks;
use crate::identity::{base_id, entry_id};
use crate::models::{EntryMetadata, LogRecord, ResolutionStatus, VectorEntry};
use crate::store::VectorStore;

pub struct Indexer {
    store: Arc<dyn VectorStore>,
    batch_size: usize,
}

impl Indexer {
    pub fn new(store: Arc<dyn VectorStore>, batch_size: usize) -> Self {
        Self {
            store,
            batch_size: batch_size.max(1),
        }
    }

    /// Index a batch of records. Returns the number of vector entries
    /// written. Fails only by propagating the store's error.
    pub async fn index(&self, records: &[LogRecord]) -> Result<usize> {
        let stored_at = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);

        let groups: Vec<Vec<VectorEntry>> = records
            .iter()
            .map(|r| record_entries(r, &stored_at))
            .collect();

        let total: usize = groups.iter().map(Vec::len).sum();
        let mut batch: Vec<VectorEntry> = Vec::new();
        let mut written = 0usize;

        for group in groups {
            if !batch.is_empty() && batch.len() + group.len() > self.batch_size {
                written += self.flush(&mut batch).await?;
            }
            batch.extend(group);
        }
        written += self.flush(&mut batch).await?;

        debug!(records = records.len(), entries = total, "indexed records");
        Ok(written)
    }

    async fn flush(&self, batch: &mut Vec<VectorEntry>) -> Result<usize> {
        if batch.is_empty() {
            return Ok(0);
        }
        self.store.upsert(batch).await?;
        let n = batch.len();
        batch.clear();
        Ok(n)
    }
}

/// Build the identified vector entries for one record.
pub fn record_entries(record: &LogRecord, stored_at: &str) -> Vec<VectorEntry> {
    let base = base_id(record);

    let (status, notes, resolved_at) = match record.known_resolution() {
        Some(r) => (
            ResolutionStatus::Resolved,
            r.to_string(),
            stored_at.to_string(),
        ),
        None => (ResolutionStatus::Pending, String::new(), String::new()),
    };

    build_chunks(record)
        .into_iter()
        .enumerate()
        .map(|(i, chunk)| VectorEntry {
            id: entry_id(&base, i),
            base_id: base.clone(),
            text: chunk.text,
            metadata: EntryMetadata {
                chunk_type: chunk.kind,
                trace_id: record.trace_id.clone(),
                service: record.service.clone(),
                error_type: record.error_type.clone(),
                error_code: record.error_code.clone(),
                timestamp: record.timestamp.clone(),
                resolution_status: status,
                resolution_notes: notes.clone(),
                resolution_timestamp: resolved_at.clone(),
                stored_at: stored_at.to_string(),
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashEmbedder;
    use crate::models::ChunkKind;
    use crate::store::memory::InMemoryVectorStore;

    fn record(trace: &str, stack: &str) -> LogRecord {
        LogRecord {
            trace_id: trace.to_string(),
            message: "Connection timed out".to_string(),
            timestamp: "2024-02-15T12:35:10Z".to_string(),
            service: "api_service".to_string(),
            error_code: "ETIMEDOUT".to_string(),
            error_type: "TimeoutError".to_string(),
            stack_trace: stack.to_string(),
            ..LogRecord::default()
        }
    }

    #[test]
    fn test_record_entries_ids_and_metadata() {
        let r = record("t-1", "");
        let entries = record_entries(&r, "2024-02-16T00:00:00Z");
        assert_eq!(entries.len(), 2);
        let base = base_id(&r);
        assert_eq!(entries[0].id, format!("{}_0", base));
        assert_eq!(entries[1].id, format!("{}_1", base));
        assert_eq!(entries[0].metadata.chunk_type, ChunkKind::ErrorDescription);
        assert_eq!(entries[1].metadata.chunk_type, ChunkKind::ServiceContext);
        assert_eq!(entries[0].metadata.resolution_status, ResolutionStatus::Pending);
        assert_eq!(entries[0].metadata.stored_at, "2024-02-16T00:00:00Z");
    }

    #[test]
    fn test_preexisting_resolution_marks_resolved() {
        let mut r = record("t-1", "");
        r.resolution = Some("Verify connection settings".to_string());
        let entries = record_entries(&r, "2024-02-16T00:00:00Z");
        assert_eq!(entries[0].metadata.resolution_status, ResolutionStatus::Resolved);
        assert_eq!(entries[0].metadata.resolution_notes, "Verify connection settings");
        assert_eq!(entries[0].metadata.resolution_timestamp, "2024-02-16T00:00:00Z");
    }

    #[tokio::test]
    async fn test_reindexing_is_idempotent() {
        let store = Arc::new(InMemoryVectorStore::new(Box::new(HashEmbedder::new(64))));
        let indexer = Indexer::new(store.clone(), 64);
        let records = vec![record("t-1", ""), record("t-2", "at x")];

        let written = indexer.index(&records).await.unwrap();
        assert_eq!(written, 5);
        assert_eq!(store.len(), 5);

        indexer.index(&records).await.unwrap();
        assert_eq!(store.len(), 5, "re-ingestion overwrites, never duplicates");
    }

    #[tokio::test]
    async fn test_small_batches_keep_record_groups_whole() {
        let store = Arc::new(InMemoryVectorStore::new(Box::new(HashEmbedder::new(64))));
        // batch_size 3 with 3-chunk records: each record flushes alone.
        let indexer = Indexer::new(store.clone(), 3);
        let records = vec![
            record("t-1", "at a"),
            record("t-2", "at b"),
            record("t-3", "at c"),
        ];
        let written = indexer.index(&records).await.unwrap();
        assert_eq!(written, 9);
        assert_eq!(store.len(), 9);
    }
}
