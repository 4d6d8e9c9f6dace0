//! Hybrid retrieval: embedding similarity combined with exact metadata
//! filters.
//!
//! Historical context is advisory, so retrieval failures are logged and
//! swallowed; callers always get a (possibly empty) result list, never an
//! error.

use std::sync::Arc;

use tracing::warn;

use crate::models::EntryMetadata;
use crate::store::{MetadataFilter, VectorStore};

pub struct Retriever {
    store: Arc<dyn VectorStore>,
}

impl Retriever {
    pub fn new(store: Arc<dyn VectorStore>) -> Self {
        Self { store }
    }

    /// Top-`k` most similar entries, restricted to those whose metadata
    /// matches every filter clause. Returns metadata only: callers format
    /// results, never re-embed. Fewer than `k` eligible results is not an
    /// error; a store failure yields an empty list.
    pub async fn search(
        &self,
        query: &str,
        filter: Option<&MetadataFilter>,
        k: usize,
    ) -> Vec<EntryMetadata> {
        match self.store.similarity_search(query, k, filter).await {
            Ok(hits) => hits.into_iter().map(|h| h.metadata).collect(),
            Err(e) => {
                warn!(error = %e, "similarity search failed; returning no historical context");
                Vec::new()
            }
        }
    }

    /// Same as [`search`](Self::search) but keeps the matched text, for
    /// callers assembling prompt context.
    pub async fn search_with_text(
        &self,
        query: &str,
        filter: Option<&MetadataFilter>,
        k: usize,
    ) -> Vec<(String, EntryMetadata)> {
        match self.store.similarity_search(query, k, filter).await {
            Ok(hits) => hits.into_iter().map(|h| (h.text, h.metadata)).collect(),
            Err(e) => {
                warn!(error = %e, "similarity search failed; returning no historical context");
                Vec::new()
            }
        }
    }
}

/// Render retrieved entries into the plain-text block handed to the
/// analysis collaborator.
pub fn render_context(hits: &[(String, EntryMetadata)]) -> String {
    hits.iter()
        .map(|(text, md)| {
            let mut line = format!(
                "- {} [service={}, error_type={}, status={}",
                text, md.service, md.error_type, md.resolution_status
            );
            if !md.resolution_notes.is_empty() {
                line.push_str(&format!(", resolution: {}", md.resolution_notes));
            }
            line.push(']');
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashEmbedder;
    use crate::index::record_entries;
    use crate::models::LogRecord;
    use crate::store::memory::InMemoryVectorStore;
    use crate::store::filter_on;

    fn seeded_store() -> Arc<InMemoryVectorStore> {
        Arc::new(InMemoryVectorStore::new(Box::new(HashEmbedder::new(128))))
    }

    fn record(service: &str, message: &str) -> LogRecord {
        LogRecord {
            trace_id: format!("t-{}", service),
            message: message.to_string(),
            timestamp: "2024-02-15T12:00:00Z".to_string(),
            service: service.to_string(),
            error_type: "TimeoutError".to_string(),
            error_code: "504".to_string(),
            ..LogRecord::default()
        }
    }

    #[tokio::test]
    async fn test_filtered_search_never_leaks_other_services() {
        let store = seeded_store();
        for r in [
            record("payment-service", "payment gateway timeout"),
            record("auth-service", "token validation timeout"),
            record("payment-service", "card processor timeout"),
        ] {
            store
                .upsert(&record_entries(&r, "2024-02-16T00:00:00Z"))
                .await
                .unwrap();
        }

        let retriever = Retriever::new(store);
        let hits = retriever
            .search("timeout", Some(&filter_on("service", "payment-service")), 5)
            .await;
        assert!(!hits.is_empty());
        assert!(hits.iter().all(|m| m.service == "payment-service"));
    }

    #[tokio::test]
    async fn test_k_bounds_results() {
        let store = seeded_store();
        for i in 0..4 {
            let r = record(&format!("svc-{}", i), "connection timeout");
            store
                .upsert(&record_entries(&r, "2024-02-16T00:00:00Z"))
                .await
                .unwrap();
        }
        let retriever = Retriever::new(store);
        let hits = retriever.search("connection timeout", None, 3).await;
        assert_eq!(hits.len(), 3);
    }

    #[test]
    fn test_render_context_includes_resolution() {
        let r = {
            let mut r = record("payment-service", "gateway timeout");
            r.resolution = Some("Raise upstream timeout".to_string());
            r
        };
        let entries = record_entries(&r, "2024-02-16T00:00:00Z");
        let hits: Vec<(String, EntryMetadata)> = entries
            .into_iter()
            .map(|e| (e.text, e.metadata))
            .collect();
        let rendered = render_context(&hits);
        assert!(rendered.contains("resolution: Raise upstream timeout"));
        assert!(rendered.contains("service=payment-service"));
    }
}
