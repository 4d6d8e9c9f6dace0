//! SQLite-backed [`VectorStore`] implementation.
//!
//! Entries live in a single `entries` table with one column per metadata
//! field and the embedding as a little-endian f32 BLOB. Upserts go through
//! `ON CONFLICT(id) DO UPDATE`, so re-ingestion overwrites in place.
//! Similarity search fetches candidate rows (narrowed by the metadata
//! filter in SQL) and ranks by cosine similarity in Rust.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob, Embedder};
use crate::models::{EntryMetadata, VectorEntry};

use super::{MetadataFilter, ResolutionPatch, ScoredEntry, VectorStore};

/// Durable vector index over a SQLite pool. Owns its embedder.
pub struct SqliteVectorStore {
    pool: SqlitePool,
    embedder: Box<dyn Embedder>,
}

impl SqliteVectorStore {
    /// Wrap an already connected (and migrated) pool.
    pub fn new(pool: SqlitePool, embedder: Box<dyn Embedder>) -> Self {
        Self { pool, embedder }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Map a filter key to its column. The filterable surface is exactly the
/// entry identity plus the metadata schema; anything else matches nothing.
fn filter_column(key: &str) -> Option<&'static str> {
    match key {
        "base_id" => Some("base_id"),
        "chunk_type" => Some("chunk_type"),
        "trace_id" => Some("trace_id"),
        "service" => Some("service"),
        "error_type" => Some("error_type"),
        "error_code" => Some("error_code"),
        "timestamp" => Some("timestamp"),
        "resolution_status" => Some("resolution_status"),
        "resolution_notes" => Some("resolution_notes"),
        "resolution_timestamp" => Some("resolution_timestamp"),
        "stored_at" => Some("stored_at"),
        _ => None,
    }
}

/// Append `WHERE`/`AND` clauses for a filter. Returns `false` when the
/// filter names a key outside the schema, in which case nothing can match.
fn push_filter(builder: &mut QueryBuilder<'_, Sqlite>, filter: &MetadataFilter) -> bool {
    let mut first = true;
    for (key, value) in filter {
        let Some(column) = filter_column(key) else {
            return false;
        };
        builder.push(if first { " WHERE " } else { " AND " });
        builder.push(column);
        builder.push(" = ");
        builder.push_bind(value.clone());
        first = false;
    }
    true
}

fn row_to_scored(row: &sqlx::sqlite::SqliteRow, score: f64) -> Result<ScoredEntry> {
    let chunk_type: String = row.get("chunk_type");
    let resolution_status: String = row.get("resolution_status");
    Ok(ScoredEntry {
        id: row.get("id"),
        base_id: row.get("base_id"),
        text: row.get("text"),
        score,
        metadata: EntryMetadata {
            chunk_type: chunk_type.parse()?,
            trace_id: row.get("trace_id"),
            service: row.get("service"),
            error_type: row.get("error_type"),
            error_code: row.get("error_code"),
            timestamp: row.get("timestamp"),
            resolution_status: resolution_status.parse()?,
            resolution_notes: row.get("resolution_notes"),
            resolution_timestamp: row.get("resolution_timestamp"),
            stored_at: row.get("stored_at"),
        },
    })
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn upsert(&self, entries: &[VectorEntry]) -> Result<()> {
        let texts: Vec<String> = entries.iter().map(|e| e.text.clone()).collect();
        let vectors = self.embedder.embed(&texts).await?;

        let mut tx = self.pool.begin().await?;
        for (entry, vector) in entries.iter().zip(vectors) {
            let md = &entry.metadata;
            sqlx::query(
                r#"
                INSERT INTO entries (id, base_id, text, embedding, chunk_type, trace_id,
                    service, error_type, error_code, timestamp, resolution_status,
                    resolution_notes, resolution_timestamp, stored_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    base_id = excluded.base_id,
                    text = excluded.text,
                    embedding = excluded.embedding,
                    chunk_type = excluded.chunk_type,
                    trace_id = excluded.trace_id,
                    service = excluded.service,
                    error_type = excluded.error_type,
                    error_code = excluded.error_code,
                    timestamp = excluded.timestamp,
                    resolution_status = excluded.resolution_status,
                    resolution_notes = excluded.resolution_notes,
                    resolution_timestamp = excluded.resolution_timestamp,
                    stored_at = excluded.stored_at
                "#,
            )
            .bind(&entry.id)
            .bind(&entry.base_id)
            .bind(&entry.text)
            .bind(vec_to_blob(&vector))
            .bind(md.chunk_type.as_str())
            .bind(&md.trace_id)
            .bind(&md.service)
            .bind(&md.error_type)
            .bind(&md.error_code)
            .bind(&md.timestamp)
            .bind(md.resolution_status.as_str())
            .bind(&md.resolution_notes)
            .bind(&md.resolution_timestamp)
            .bind(&md.stored_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
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

        let mut builder: QueryBuilder<'_, Sqlite> =
            QueryBuilder::new("SELECT * FROM entries");
        if let Some(f) = filter {
            if !push_filter(&mut builder, f) {
                return Ok(Vec::new());
            }
        }

        let rows = builder.build().fetch_all(&self.pool).await?;

        let mut hits = Vec::with_capacity(rows.len());
        for row in &rows {
            let blob: Vec<u8> = row.get("embedding");
            let score = cosine_similarity(&query_vec, &blob_to_vec(&blob)) as f64;
            hits.push(row_to_scored(row, score)?);
        }

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
        let mut tx = self.pool.begin().await?;
        for id in ids {
            sqlx::query("DELETE FROM entries WHERE id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn update_metadata(
        &self,
        filter: &MetadataFilter,
        patch: &ResolutionPatch,
    ) -> Result<u64> {
        let mut builder: QueryBuilder<'_, Sqlite> =
            QueryBuilder::new("UPDATE entries SET resolution_status = ");
        builder.push_bind(patch.status.as_str());
        builder.push(", resolution_notes = ");
        builder.push_bind(patch.notes.clone());
        builder.push(", resolution_timestamp = ");
        builder.push_bind(patch.timestamp.clone());

        if !push_filter(&mut builder, filter) {
            return Ok(0);
        }

        let result = builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashEmbedder;
    use crate::migrate::apply_schema;
    use crate::models::{ChunkKind, ResolutionStatus};
    use crate::store::filter_on;
    use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
    use std::str::FromStr as _;
    use tempfile::TempDir;

    async fn store(tmp: &TempDir) -> SqliteVectorStore {
        let path = tmp.path().join("errlens.db");
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
            .unwrap()
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(2)
            .connect_with(options)
            .await
            .unwrap();
        apply_schema(&pool).await.unwrap();
        SqliteVectorStore::new(pool, Box::new(HashEmbedder::new(64)))
    }

    fn entry(id: &str, base: &str, text: &str, service: &str) -> VectorEntry {
        VectorEntry {
            id: id.to_string(),
            base_id: base.to_string(),
            text: text.to_string(),
            metadata: EntryMetadata {
                chunk_type: ChunkKind::ErrorDescription,
                trace_id: "t-1".to_string(),
                service: service.to_string(),
                error_type: "TimeoutError".to_string(),
                error_code: "504".to_string(),
                timestamp: "2024-02-15T12:35:10Z".to_string(),
                resolution_status: ResolutionStatus::Pending,
                resolution_notes: String::new(),
                resolution_timestamp: String::new(),
                stored_at: "2024-02-16T00:00:00Z".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let s = store(&tmp).await;
        let e = entry("a_0", "a", "connection timeout", "svc");
        s.upsert(&[e.clone()]).await.unwrap();
        s.upsert(&[e]).await.unwrap();

        let hits = s.similarity_search("connection timeout", 10, None).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "a_0");
    }

    #[tokio::test]
    async fn test_filter_and_update_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let s = store(&tmp).await;
        s.upsert(&[
            entry("a_0", "a", "timeout in payments", "payment-service"),
            entry("a_1", "a", "payment context", "payment-service"),
            entry("b_0", "b", "timeout in auth", "auth-service"),
        ])
        .await
        .unwrap();

        let hits = s
            .similarity_search("timeout", 10, Some(&filter_on("service", "payment-service")))
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|h| h.metadata.service == "payment-service"));

        let patch = ResolutionPatch {
            status: ResolutionStatus::Resolved,
            notes: "fixed config".to_string(),
            timestamp: "2024-02-17T00:00:00Z".to_string(),
        };
        let touched = s.update_metadata(&filter_on("base_id", "a"), &patch).await.unwrap();
        assert_eq!(touched, 2);

        let hits = s
            .similarity_search("timeout in payments", 1, Some(&filter_on("base_id", "a")))
            .await
            .unwrap();
        assert_eq!(hits[0].metadata.resolution_status, ResolutionStatus::Resolved);
        assert_eq!(hits[0].text, "timeout in payments");
    }

    #[tokio::test]
    async fn test_unknown_filter_key_matches_nothing() {
        let tmp = TempDir::new().unwrap();
        let s = store(&tmp).await;
        s.upsert(&[entry("a_0", "a", "x", "svc")]).await.unwrap();

        let hits = s
            .similarity_search("x", 10, Some(&filter_on("nonexistent", "v")))
            .await
            .unwrap();
        assert!(hits.is_empty());

        let patch = ResolutionPatch {
            status: ResolutionStatus::InProgress,
            notes: String::new(),
            timestamp: String::new(),
        };
        assert_eq!(
            s.update_metadata(&filter_on("nonexistent", "v"), &patch).await.unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_delete_by_id() {
        let tmp = TempDir::new().unwrap();
        let s = store(&tmp).await;
        s.upsert(&[entry("a_0", "a", "x", "svc"), entry("a_1", "a", "y", "svc")])
            .await
            .unwrap();
        s.delete(&["a_0".to_string()]).await.unwrap();
        let hits = s.similarity_search("x", 10, None).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "a_1");
    }
}
