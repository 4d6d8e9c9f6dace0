//! Vector-store capability.
//!
//! The [`VectorStore`] trait defines the four operations the indexing and
//! retrieval engine needs from a vector index: upsert, similarity search,
//! delete, and metadata update. Embedding is internal to each
//! implementation: stores own an [`Embedder`](crate::embedding::Embedder)
//! and callers only ever see text and metadata.
//!
//! Implementations must be `Send + Sync`; they are constructed once at
//! process start and shared by the indexer, retriever, and tracker.

pub mod memory;
pub mod sqlite;

use std::collections::BTreeMap;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{EntryMetadata, ResolutionStatus, VectorEntry};

/// Exact-match metadata filter with AND semantics: an entry is eligible
/// only if every key equals the corresponding indexed value. The special
/// key `base_id` addresses the entry's record identity; all other keys
/// address [`EntryMetadata`] fields. Keys outside the schema match
/// nothing.
pub type MetadataFilter = BTreeMap<String, String>;

/// Build a single-key filter.
pub fn filter_on(key: &str, value: &str) -> MetadataFilter {
    let mut f = MetadataFilter::new();
    f.insert(key.to_string(), value.to_string());
    f
}

/// Whether an entry satisfies every clause of a filter.
pub fn entry_matches(entry: &VectorEntry, filter: &MetadataFilter) -> bool {
    filter.iter().all(|(key, want)| match key.as_str() {
        "base_id" => entry.base_id == *want,
        _ => entry.metadata.field(key).as_deref() == Some(want.as_str()),
    })
}

/// The only metadata mutation the store accepts after an entry is written.
/// Restricting the patch surface to the resolution fields structurally
/// guarantees that `text` and vectors stay untouched.
#[derive(Debug, Clone)]
pub struct ResolutionPatch {
    pub status: ResolutionStatus,
    pub notes: String,
    pub timestamp: String,
}

impl ResolutionPatch {
    /// Apply to one entry's metadata.
    pub fn apply(&self, metadata: &mut EntryMetadata) {
        metadata.resolution_status = self.status;
        metadata.resolution_notes = self.notes.clone();
        metadata.resolution_timestamp = self.timestamp.clone();
    }
}

/// One ranked search hit: entry identity plus metadata. Raw vectors never
/// leave the store.
#[derive(Debug, Clone)]
pub struct ScoredEntry {
    pub id: String,
    pub base_id: String,
    pub text: String,
    pub score: f64,
    pub metadata: EntryMetadata,
}

/// Abstract vector index.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`upsert`](VectorStore::upsert) | Embed and write entries; same id overwrites |
/// | [`similarity_search`](VectorStore::similarity_search) | Ranked top-k with optional exact-match filter |
/// | [`delete`](VectorStore::delete) | Remove entries by id |
/// | [`update_metadata`](VectorStore::update_metadata) | Patch resolution fields on matching entries |
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Embed each entry's text and write it under its id. Writing an id
    /// that already exists replaces the previous entry; upserts are the
    /// idempotence mechanism, there is no secondary dedup pass.
    async fn upsert(&self, entries: &[VectorEntry]) -> Result<()>;

    /// Return up to `k` entries most similar to `query`, most-similar
    /// first. A filter restricts eligibility before ranking; fewer than
    /// `k` eligible entries is not an error.
    async fn similarity_search(
        &self,
        query: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<ScoredEntry>>;

    /// Remove entries by id. Unknown ids are ignored.
    async fn delete(&self, ids: &[String]) -> Result<()>;

    /// Apply a resolution patch to every entry matching the filter.
    /// Returns the number of entries touched. Never re-embeds.
    async fn update_metadata(&self, filter: &MetadataFilter, patch: &ResolutionPatch)
        -> Result<u64>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChunkKind, EntryMetadata, VectorEntry};

    fn entry(service: &str) -> VectorEntry {
        VectorEntry {
            id: "b_0".to_string(),
            base_id: "b".to_string(),
            text: "Service: x".to_string(),
            metadata: EntryMetadata {
                chunk_type: ChunkKind::ServiceContext,
                trace_id: "t-1".to_string(),
                service: service.to_string(),
                error_type: "TimeoutError".to_string(),
                error_code: "504".to_string(),
                timestamp: String::new(),
                resolution_status: ResolutionStatus::Pending,
                resolution_notes: String::new(),
                resolution_timestamp: String::new(),
                stored_at: String::new(),
            },
        }
    }

    #[test]
    fn test_filter_and_semantics() {
        let e = entry("payment-service");
        let mut f = filter_on("service", "payment-service");
        assert!(entry_matches(&e, &f));
        f.insert("error_type".to_string(), "TimeoutError".to_string());
        assert!(entry_matches(&e, &f));
        f.insert("error_code".to_string(), "500".to_string());
        assert!(!entry_matches(&e, &f));
    }

    #[test]
    fn test_filter_base_id_and_unknown_keys() {
        let e = entry("payment-service");
        assert!(entry_matches(&e, &filter_on("base_id", "b")));
        assert!(!entry_matches(&e, &filter_on("base_id", "other")));
        assert!(!entry_matches(&e, &filter_on("no_such_key", "x")));
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        assert!(entry_matches(&entry("a"), &MetadataFilter::new()));
    }
}
