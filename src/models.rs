//! Core data models used throughout errlens.
//!
//! These types represent the error records, chunks, and vector entries that
//! flow through the indexing and retrieval pipeline, plus the state threaded
//! through the analysis workflow.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One observed error event, normalized from raw telemetry attributes.
///
/// Every string field is populated even when semantically unknown: identity
/// fields default to `"unknown"`, free-text fields to the empty string.
/// Records are immutable once built; resolution changes apply to the
/// indexed copy's metadata, never to the record itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRecord {
    #[serde(default = "unknown")]
    pub trace_id: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default = "unknown")]
    pub service: String,
    #[serde(default = "unknown")]
    pub error_code: String,
    #[serde(default = "unknown")]
    pub error_type: String,
    #[serde(default)]
    pub stack_trace: String,
    #[serde(default = "unknown")]
    pub host: String,
    #[serde(default = "unknown")]
    pub environment: String,
    #[serde(default)]
    pub additional_context: BTreeMap<String, String>,
    #[serde(default)]
    pub resolution: Option<String>,
}

pub(crate) fn unknown() -> String {
    "unknown".to_string()
}

impl Default for LogRecord {
    fn default() -> Self {
        Self {
            trace_id: unknown(),
            message: String::new(),
            timestamp: String::new(),
            service: unknown(),
            error_code: unknown(),
            error_type: unknown(),
            stack_trace: String::new(),
            host: unknown(),
            environment: unknown(),
            additional_context: BTreeMap::new(),
            resolution: None,
        }
    }
}

impl LogRecord {
    /// A resolution counts as pre-existing only when it carries real text.
    pub fn known_resolution(&self) -> Option<&str> {
        match self.resolution.as_deref() {
            Some(r) if !r.is_empty() && r != "unknown" => Some(r),
            _ => None,
        }
    }

    /// One-line rendering used when assembling prompt context.
    pub fn render(&self) -> String {
        format!(
            "[{}] {} {} ({}/{}): {}",
            self.timestamp, self.service, self.error_type, self.error_code, self.trace_id, self.message
        )
    }
}

/// The semantic role of a chunk within its record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkKind {
    ErrorDescription,
    ServiceContext,
    StackTrace,
}

impl ChunkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkKind::ErrorDescription => "error_description",
            ChunkKind::ServiceContext => "service_context",
            ChunkKind::StackTrace => "stack_trace",
        }
    }
}

impl fmt::Display for ChunkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChunkKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "error_description" => Ok(ChunkKind::ErrorDescription),
            "service_context" => Ok(ChunkKind::ServiceContext),
            "stack_trace" => Ok(ChunkKind::StackTrace),
            other => anyhow::bail!("unknown chunk type: '{}'", other),
        }
    }
}

/// One searchable text fragment derived from a [`LogRecord`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    pub kind: ChunkKind,
}

/// Resolution lifecycle attached to an indexed record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStatus {
    Pending,
    InProgress,
    Resolved,
}

impl ResolutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionStatus::Pending => "pending",
            ResolutionStatus::InProgress => "in_progress",
            ResolutionStatus::Resolved => "resolved",
        }
    }
}

impl fmt::Display for ResolutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResolutionStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ResolutionStatus::Pending),
            "in_progress" => Ok(ResolutionStatus::InProgress),
            "resolved" => Ok(ResolutionStatus::Resolved),
            other => anyhow::bail!("unknown resolution status: '{}'", other),
        }
    }
}

/// Structured metadata stored alongside each vector.
///
/// `resolution_status`, `resolution_notes`, and `resolution_timestamp` are
/// the only fields ever mutated after the entry is written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryMetadata {
    pub chunk_type: ChunkKind,
    pub trace_id: String,
    pub service: String,
    pub error_type: String,
    pub error_code: String,
    pub timestamp: String,
    pub resolution_status: ResolutionStatus,
    pub resolution_notes: String,
    pub resolution_timestamp: String,
    pub stored_at: String,
}

impl EntryMetadata {
    /// Look up a metadata field by its wire name. Returns `None` for keys
    /// that are not part of the schema.
    pub fn field(&self, key: &str) -> Option<String> {
        match key {
            "chunk_type" => Some(self.chunk_type.as_str().to_string()),
            "trace_id" => Some(self.trace_id.clone()),
            "service" => Some(self.service.clone()),
            "error_type" => Some(self.error_type.clone()),
            "error_code" => Some(self.error_code.clone()),
            "timestamp" => Some(self.timestamp.clone()),
            "resolution_status" => Some(self.resolution_status.as_str().to_string()),
            "resolution_notes" => Some(self.resolution_notes.clone()),
            "resolution_timestamp" => Some(self.resolution_timestamp.clone()),
            "stored_at" => Some(self.stored_at.clone()),
            _ => None,
        }
    }
}

/// One unit stored in the vector index: a chunk's text plus its identity
/// and metadata. `id` is `"{base_id}_{chunk_index}"`; `base_id` is shared
/// by all chunks of one record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorEntry {
    pub id: String,
    pub base_id: String,
    pub text: String,
    pub metadata: EntryMetadata,
}

/// Incoming error descriptor handed to the analysis pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorQuery {
    pub code: String,
    pub message: String,
    #[serde(default)]
    pub stack_trace: String,
    #[serde(default)]
    pub trace_id: Option<String>,
    #[serde(default)]
    pub service: Option<String>,
}

/// External capabilities the pipeline may draw on. Selection is advisory:
/// a stage only skips its work when its capability is explicitly excluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Telemetry,
    HistoricalSearch,
    Documentation,
}

/// Final structured output of an analysis run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisOutput {
    pub analysis: String,
    #[serde(default)]
    pub possible_causes: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

impl AnalysisOutput {
    /// Fallback output when the analysis collaborator fails outright.
    pub fn degraded(reason: &str) -> Self {
        Self {
            analysis: format!("Analysis unavailable: {}", reason),
            possible_causes: Vec::new(),
            recommendations: Vec::new(),
        }
    }
}

/// Working state threaded through the analysis pipeline. Each stage reads
/// the fields written before it and fills in its own.
#[derive(Debug, Clone)]
pub struct AnalysisState {
    pub query: ErrorQuery,
    pub capabilities: Vec<Capability>,
    pub related_logs: Vec<LogRecord>,
    pub historical_context: String,
    pub output: AnalysisOutput,
}

impl AnalysisState {
    pub fn new(query: ErrorQuery) -> Self {
        Self {
            query,
            capabilities: Vec::new(),
            related_logs: Vec::new(),
            historical_context: String::new(),
            output: AnalysisOutput {
                analysis: String::new(),
                possible_causes: Vec::new(),
                recommendations: Vec::new(),
            },
        }
    }
}
