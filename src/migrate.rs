use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply_schema(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create the entries table and indexes. Idempotent.
pub async fn apply_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS entries (
            id TEXT PRIMARY KEY,
            base_id TEXT NOT NULL,
            text TEXT NOT NULL,
            embedding BLOB NOT NULL,
            chunk_type TEXT NOT NULL,
            trace_id TEXT NOT NULL,
            service TEXT NOT NULL,
            error_type TEXT NOT NULL,
            error_code TEXT NOT NULL,
            timestamp TEXT NOT NULL,
            resolution_status TEXT NOT NULL DEFAULT 'pending',
            resolution_notes TEXT NOT NULL DEFAULT '',
            resolution_timestamp TEXT NOT NULL DEFAULT '',
            stored_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_entries_base_id ON entries(base_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_entries_service ON entries(service)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_entries_status ON entries(resolution_status)")
        .execute(pool)
        .await?;

    Ok(())
}
