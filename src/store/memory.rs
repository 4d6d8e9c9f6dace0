//! In-memory [`VectorStore`] implementation.
//!
//! `HashMap` behind `std::sync::RwLock`; similarity search is brute-force
//! cosine over all stored vectors. Used by the test suite and by local
//! runs that don't want a database file.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;

use crate::embedding::{cosine_similarity, Embedder};
use crate::models::VectorEntry;

use super::{entry_matches, MetadataFilter, ResolutionPatch, ScoredEntry, VectorStore};

struct StoredEntry {
    entry: VectorEntry,
    vector: Vec<f32>,
}

/// Brute-force in-memory vector index. Owns its embedder.
pub struct InMemoryVectorStore {
    embedder: Box<dyn Embedder>,
    entries: RwLock<HashMap<String, StoredEntry>>,
}

impl InMemoryVectorStore {
    pub fn new(embedder: Box<dyn Embedder>) -> Self {
        Self {
            embedder,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of one entry by id, for inspection in tests and tooling.
    pub fn get(&self, id: &str) -> Option<VectorEntry> {
        self.entries.read().unwrap().get(id).map(|s| s.entry.clone())
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn upsert(&self, entries: &[VectorEntry]) -> Result<()> {
        let texts: Vec<String> = entries.iter().map(|e| e.text.clone()).collect();
        let vectors = self.embedder.embed(&texts).await?;

        let mut stored = self.entries.write().unwrap();
        for (entry, vector) in entries.iter().zip(vectors) {
            stored.insert(
                entry.id.clone(),
                StoredEntry {
                    entry: entry.clone(),
                    vector,
                },
            );
        }
        Ok(())
    }

    async fn similarity_search(
        &self,
        query: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<ScoredEntry>> {
        let query_vec = self
            .embedder
            .embed(&[query.to_string()])
            .await?
            .into_iter()
            .next()
            .unwrap_or_default();

        let stored = self.entries.read().unwrap();
        let mut hits: Vec<ScoredEntry> = stored
            .values()
            .filter(|s| filter.map_or(true, |f| entry_matches(&s.entry, f)))
            .map(|s| ScoredEntry {
                id: s.entry.id.clone(),
                base_id: s.entry.base_id.clone(),
                text: s.entry.text.clone(),
                score: cosine_similarity(&query_vec, &s.vector) as f64,
                metadata: s.entry.metadata.clone(),
            })
            .collect();

        // Score desc, id asc for deterministic ordering on ties.
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        hits.truncate(k);
        Ok(hits)
    }

    async fn delete(&self, ids: &[String]) -> Result<()> {
        let mut stored = self.entries.write().unwrap();
        for id in ids {
            stored.remove(id);
        }
        Ok(())
    }

    async fn update_metadata(
        &self,
        filter: &MetadataFilter,
        patch: &ResolutionPatch,
    ) -> Result<u64> {
        let mut stored = self.entries.write().unwrap();
        let mut touched = 0u64;
        for s in stored.values_mut() {
            if entry_matches(&s.entry, filter) {
                patch.apply(&mut s.entry.metadata);
                touched += 1;
            }
        }
        Ok(touched)
    }
}
