//! End-to-end tests for the indexing engine and the analysis pipeline.
//!
//! These run against the in-memory vector store with stub telemetry and
//! analysis collaborators, proving the contracts hold through the real
//! ingestion and pipeline code paths.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Duration;
use serde_json::json;

use errlens::analysis::{Analyst, ContextBundle};
use errlens::config::Config;
use errlens::embedding::HashEmbedder;
use errlens::identity::base_id;
use errlens::index::Indexer;
use errlens::models::{
    AnalysisOutput, ChunkKind, ErrorQuery, LogRecord, ResolutionStatus,
};
use errlens::normalize::RawLog;
use errlens::pipeline::Pipeline;
use errlens::resolution::ResolutionTracker;
use errlens::retrieve::Retriever;
use errlens::seed;
use errlens::store::memory::InMemoryVectorStore;
use errlens::store::{filter_on, VectorStore};
use errlens::telemetry::TelemetryFetch;

// ─── Stub collaborators ─────────────────────────────────────────────

/// Telemetry stub serving fixed payloads for each query shape.
struct StaticTelemetry {
    by_trace: Vec<RawLog>,
    recent: Vec<RawLog>,
}

#[async_trait]
impl TelemetryFetch for StaticTelemetry {
    async fn fetch_by_trace(&self, _trace_id: &str, _lookback: Duration) -> Result<Vec<RawLog>> {
        Ok(self.by_trace.clone())
    }

    async fn fetch_recent_errors(&self, _lookback: Duration) -> Result<Vec<RawLog>> {
        Ok(self.recent.clone())
    }
}

/// Telemetry stub whose every call fails.
struct DownTelemetry;

#[async_trait]
impl TelemetryFetch for DownTelemetry {
    async fn fetch_by_trace(&self, _trace_id: &str, _lookback: Duration) -> Result<Vec<RawLog>> {
        anyhow::bail!("telemetry unreachable")
    }

    async fn fetch_recent_errors(&self, _lookback: Duration) -> Result<Vec<RawLog>> {
        anyhow::bail!("telemetry unreachable")
    }
}

/// Analyst stub that reports on the context it was handed.
struct EchoAnalyst;

#[async_trait]
impl Analyst for EchoAnalyst {
    async fn generate(&self, bundle: &ContextBundle) -> Result<AnalysisOutput> {
        let missing = bundle.related_logs.is_empty() && bundle.historical_data.is_empty();
        Ok(AnalysisOutput {
            analysis: if missing {
                format!(
                    "No related logs or historical context were available for '{}'.",
                    bundle.error_message
                )
            } else {
                format!("Analyzed '{}' with gathered context.", bundle.error_message)
            },
            possible_causes: vec!["stubbed cause".to_string()],
            recommendations: vec!["stubbed recommendation".to_string()],
        })
    }
}

/// Analyst stub whose every call fails.
struct DownAnalyst;

#[async_trait]
impl Analyst for DownAnalyst {
    async fn generate(&self, _bundle: &ContextBundle) -> Result<AnalysisOutput> {
        anyhow::bail!("model endpoint unreachable")
    }
}

// ─── Helpers ────────────────────────────────────────────────────────

fn store() -> Arc<InMemoryVectorStore> {
    Arc::new(InMemoryVectorStore::new(Box::new(HashEmbedder::new(128))))
}

fn raw_log(service: &str, message: &str, timestamp: &str) -> RawLog {
    RawLog::from(json!({
        "trace_id": "t-related",
        "message": message,
        "timestamp": timestamp,
        "service": service,
        "error": { "code": "500", "type": "DatabaseError" },
    }))
}

fn pipeline(
    store: Arc<InMemoryVectorStore>,
    telemetry: Arc<dyn TelemetryFetch>,
    analyst: Arc<dyn Analyst>,
) -> Pipeline {
    let cfg = Config::default();
    Pipeline::new(
        Retriever::new(store as Arc<dyn VectorStore>),
        telemetry,
        analyst,
        &cfg,
    )
}

// ─── Indexing engine ────────────────────────────────────────────────

#[tokio::test]
async fn ingest_timeout_record_stores_two_pending_vectors() {
    let store = store();
    let indexer = Indexer::new(store.clone() as Arc<dyn VectorStore>, 64);

    let record = LogRecord {
        trace_id: "t-1".to_string(),
        message: "Connection timed out".to_string(),
        service: "api_service".to_string(),
        error_code: "ETIMEDOUT".to_string(),
        error_type: "TimeoutError".to_string(),
        stack_trace: String::new(),
        ..LogRecord::default()
    };

    let written = indexer.index(std::slice::from_ref(&record)).await.unwrap();
    assert_eq!(written, 2);

    let h = base_id(&record);
    let first = store.get(&format!("{}_0", h)).expect("first chunk stored");
    let second = store.get(&format!("{}_1", h)).expect("second chunk stored");
    assert_eq!(first.metadata.chunk_type, ChunkKind::ErrorDescription);
    assert_eq!(second.metadata.chunk_type, ChunkKind::ServiceContext);
    assert_eq!(first.metadata.resolution_status, ResolutionStatus::Pending);
    assert_eq!(second.metadata.resolution_status, ResolutionStatus::Pending);
    assert!(store.get(&format!("{}_2", h)).is_none());
}

#[tokio::test]
async fn seed_then_search_filter_and_resolve() {
    let store = store();
    let indexer = Indexer::new(store.clone() as Arc<dyn VectorStore>, 64);
    indexer.index(&seed::sample_records()).await.unwrap();

    // Filtered search never leaks another service.
    let retriever = Retriever::new(store.clone() as Arc<dyn VectorStore>);
    let hits = retriever
        .search(
            "payment failure",
            Some(&filter_on("service", "payment-service")),
            5,
        )
        .await;
    assert!(!hits.is_empty());
    assert!(hits.iter().all(|m| m.service == "payment-service"));

    // Resolve one record and observe the change on all of its chunks,
    // with the text untouched.
    let target = seed::sample_records()
        .into_iter()
        .find(|r| r.service == "cache-service")
        .unwrap();
    let base = base_id(&target);
    let before = store.get(&format!("{}_0", base)).unwrap();

    let tracker = ResolutionTracker::new(store.clone() as Arc<dyn VectorStore>);
    let touched = tracker
        .update(&base, ResolutionStatus::InProgress, "failover in flight")
        .await
        .unwrap();
    assert_eq!(touched, 2);

    let after = store.get(&format!("{}_0", base)).unwrap();
    assert_eq!(after.metadata.resolution_status, ResolutionStatus::InProgress);
    assert_eq!(after.metadata.resolution_notes, "failover in flight");
    assert_eq!(after.text, before.text);
}

#[tokio::test]
async fn reingestion_overwrites_instead_of_duplicating() {
    let store = store();
    let indexer = Indexer::new(store.clone() as Arc<dyn VectorStore>, 64);
    let records = seed::sample_records();

    indexer.index(&records).await.unwrap();
    let first_count = store.len();
    indexer.index(&records).await.unwrap();
    assert_eq!(store.len(), first_count);
}

// ─── Analysis pipeline ──────────────────────────────────────────────

#[tokio::test]
async fn trace_miss_falls_back_to_recent_errors() {
    let telemetry = Arc::new(StaticTelemetry {
        by_trace: Vec::new(),
        recent: vec![
            raw_log("database-service", "deadlock detected", "2024-02-15T12:00:00Z"),
            raw_log("database-service", "lock wait timeout", "2024-02-15T12:01:00Z"),
        ],
    });
    let p = pipeline(store(), telemetry, Arc::new(EchoAnalyst));

    let state = p
        .run(ErrorQuery {
            code: "500".to_string(),
            message: "deadlock".to_string(),
            trace_id: Some("t-unseen".to_string()),
            ..ErrorQuery::default()
        })
        .await;

    assert_eq!(state.related_logs.len(), 2);
    // Service backfilled from the first related log.
    assert_eq!(state.query.service.as_deref(), Some("database-service"));
}

#[tokio::test]
async fn pipeline_produces_output_with_no_context_at_all() {
    let telemetry = Arc::new(StaticTelemetry {
        by_trace: Vec::new(),
        recent: Vec::new(),
    });
    let p = pipeline(store(), telemetry, Arc::new(EchoAnalyst));

    let state = p
        .run(ErrorQuery {
            code: "504".to_string(),
            message: "gateway timeout".to_string(),
            ..ErrorQuery::default()
        })
        .await;

    assert!(state.related_logs.is_empty());
    assert!(state.historical_context.is_empty());
    assert!(!state.output.analysis.is_empty());
    assert!(state.output.analysis.contains("No related logs"));
}

#[tokio::test]
async fn pipeline_survives_every_collaborator_failing() {
    let p = pipeline(store(), Arc::new(DownTelemetry), Arc::new(DownAnalyst));

    let state = p
        .run(ErrorQuery {
            code: "500".to_string(),
            message: "everything is down".to_string(),
            trace_id: Some("t-1".to_string()),
            ..ErrorQuery::default()
        })
        .await;

    assert!(state.related_logs.is_empty());
    assert!(!state.output.analysis.is_empty());
    assert!(state.output.analysis.contains("Analysis unavailable"));
}

#[tokio::test]
async fn historical_context_reaches_the_analyst() {
    let store = store();
    let indexer = Indexer::new(store.clone() as Arc<dyn VectorStore>, 64);
    indexer.index(&seed::sample_records()).await.unwrap();

    let telemetry = Arc::new(StaticTelemetry {
        by_trace: vec![raw_log(
            "database-service",
            "connection pool exhausted",
            "2024-02-15T12:00:00Z",
        )],
        recent: Vec::new(),
    });
    let p = pipeline(store, telemetry, Arc::new(EchoAnalyst));

    let state = p
        .run(ErrorQuery {
            code: "504".to_string(),
            message: "Connection timeout while connecting to database".to_string(),
            trace_id: Some("t-related".to_string()),
            ..ErrorQuery::default()
        })
        .await;

    assert!(!state.historical_context.is_empty());
    assert!(state.historical_context.contains("database-service"));
    assert!(state.output.analysis.contains("gathered context"));
}
