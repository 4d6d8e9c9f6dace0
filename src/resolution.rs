//! Resolution lifecycle updates.
//!
//! Mutates the `resolution_*` metadata of every chunk sharing a base id.
//! Metadata-level only: the store's patch surface cannot reach `text` or
//! the embedding vectors, so an update never re-embeds anything.

use std::sync::Arc;

use anyhow::Result;
use chrono::{SecondsFormat, Utc};
use tracing::info;

use crate::models::ResolutionStatus;
use crate::store::{filter_on, ResolutionPatch, VectorStore};

pub struct ResolutionTracker {
    store: Arc<dyn VectorStore>,
}

impl ResolutionTracker {
    pub fn new(store: Arc<dyn VectorStore>) -> Self {
        Self { store }
    }

    /// Set the resolution state on every entry of one record. Returns the
    /// number of entries touched (0 when the base id is unknown).
    /// Idempotent with respect to status and notes; only the
    /// `resolution_timestamp` reflects the latest call.
    pub async fn update(
        &self,
        base_id: &str,
        status: ResolutionStatus,
        notes: &str,
    ) -> Result<u64> {
        let patch = ResolutionPatch {
            status,
            notes: notes.to_string(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        };
        let touched = self
            .store
            .update_metadata(&filter_on("base_id", base_id), &patch)
            .await?;
        info!(base_id, status = %status, touched, "resolution updated");
        Ok(touched)
    }
}
