use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub indexing: IndexingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./data/errlens.db")
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexingConfig {
    /// Maximum number of vectors per upsert batch. A single record's
    /// chunk group is never split across batches.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
        }
    }
}

fn default_batch_size() -> usize {
    64
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Number of historical entries pulled in as analysis context.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// `hashed` (deterministic, offline) or `ollama`.
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_dims")]
    pub dims: usize,
    #[serde(default = "default_ollama_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: default_embedding_model(),
            dims: default_dims(),
            endpoint: default_ollama_endpoint(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_embedding_provider() -> String {
    "hashed".to_string()
}
fn default_embedding_model() -> String {
    "nomic-embed-text".to_string()
}
fn default_dims() -> usize {
    256
}
fn default_ollama_endpoint() -> String {
    "http://127.0.0.1:11434".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelemetryConfig {
    #[serde(default = "default_telemetry_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Lookback for trace-scoped fetches.
    #[serde(default = "default_trace_lookback")]
    pub trace_lookback_hours: i64,
    /// Lookback for the recent-errors fallback.
    #[serde(default = "default_recent_lookback")]
    pub recent_lookback_hours: i64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            endpoint: default_telemetry_endpoint(),
            timeout_secs: default_timeout_secs(),
            trace_lookback_hours: default_trace_lookback(),
            recent_lookback_hours: default_recent_lookback(),
        }
    }
}

fn default_telemetry_endpoint() -> String {
    "http://127.0.0.1:8080".to_string()
}
fn default_trace_lookback() -> i64 {
    1
}
fn default_recent_lookback() -> i64 {
    24
}

#[derive(Debug, Deserialize, Clone)]
pub struct AnalysisConfig {
    #[serde(default = "default_ollama_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_analysis_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_analysis_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            endpoint: default_ollama_endpoint(),
            model: default_analysis_model(),
            temperature: default_temperature(),
            timeout_secs: default_analysis_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_analysis_model() -> String {
    "llama3.2".to_string()
}
fn default_temperature() -> f64 {
    0.2
}
fn default_analysis_timeout() -> u64 {
    120
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.indexing.batch_size == 0 {
        anyhow::bail!("indexing.batch_size must be > 0");
    }
    if config.retrieval.top_k == 0 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }
    if config.embedding.dims == 0 {
        anyhow::bail!("embedding.dims must be > 0");
    }
    match config.embedding.provider.as_str() {
        "hashed" | "ollama" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be hashed or ollama.",
            other
        ),
    }
    if config.telemetry.trace_lookback_hours <= 0 || config.telemetry.recent_lookback_hours <= 0 {
        anyhow::bail!("telemetry lookback windows must be positive");
    }
    if !(0.0..=2.0).contains(&config.analysis.temperature) {
        anyhow::bail!("analysis.temperature must be in [0.0, 2.0]");
    }
    Ok(())
}
