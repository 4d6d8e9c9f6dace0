//! # errlens CLI
//!
//! The `errlens` binary drives the indexing and analysis engine. It
//! provides commands for database initialization, record ingestion,
//! similarity search, resolution tracking, and running the analysis
//! pipeline against an incoming error.
//!
//! ## Usage
//!
//! ```bash
//! errlens --config ./config/errlens.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `errlens init` | Create the SQLite database and run schema migrations |
//! | `errlens seed` | Index the built-in sample error records |
//! | `errlens ingest <file>` | Ingest raw log attribute maps from a JSON file |
//! | `errlens search "<query>"` | Search indexed fragments, optionally per service |
//! | `errlens resolve <base_id>` | Update a record's resolution lifecycle |
//! | `errlens analyze` | Run the full analysis pipeline for one error |

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use errlens::analysis::OllamaAnalyst;
use errlens::config::{self, Config};
use errlens::db;
use errlens::embedding::create_embedder;
use errlens::index::Indexer;
use errlens::migrate;
use errlens::models::{ErrorQuery, ResolutionStatus};
use errlens::normalize::RawLog;
use errlens::pipeline::Pipeline;
use errlens::resolution::ResolutionTracker;
use errlens::retrieve::Retriever;
use errlens::seed;
use errlens::store::sqlite::SqliteVectorStore;
use errlens::store::{filter_on, VectorStore};
use errlens::telemetry::HttpTelemetryClient;

/// errlens: error-log vector indexing, hybrid retrieval, and grounded
/// incident analysis.
#[derive(Parser)]
#[command(
    name = "errlens",
    about = "errlens: error-log vector indexing, hybrid retrieval, and grounded incident analysis",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/errlens.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the entries table. Idempotent.
    Init,

    /// Index the built-in sample error records.
    ///
    /// Useful for demos and for smoke-testing search before a telemetry
    /// source is wired up.
    Seed,

    /// Ingest raw log records from a JSON file.
    ///
    /// The file holds an array of attribute maps; missing or oddly typed
    /// fields are defaulted at normalization time.
    Ingest {
        /// Path to a JSON file with an array of raw log attribute maps.
        file: PathBuf,
    },

    /// Search indexed fragments by similarity.
    Search {
        /// The search query string.
        query: String,

        /// Restrict results to one service.
        #[arg(long)]
        service: Option<String>,

        /// Maximum number of results to return.
        #[arg(long, default_value_t = 5)]
        k: usize,
    },

    /// Update the resolution lifecycle of an indexed record.
    ///
    /// Applies to every fragment sharing the base id; vectors and text are
    /// untouched.
    Resolve {
        /// The record's base id (as shown by `search`).
        base_id: String,

        /// New status: pending, in_progress, or resolved.
        #[arg(long)]
        status: String,

        /// Free-text resolution notes.
        #[arg(long, default_value = "")]
        notes: String,
    },

    /// Run the analysis pipeline for one incoming error.
    Analyze {
        /// Error code of the incident.
        #[arg(long)]
        code: String,

        /// Error message to analyze.
        #[arg(long)]
        message: String,

        /// Associated stack trace, if any.
        #[arg(long, default_value = "")]
        stack_trace: String,

        /// Trace id for fetching related logs.
        #[arg(long)]
        trace_id: Option<String>,

        /// Service the error originated from, if known.
        #[arg(long)]
        service: Option<String>,
    },
}

async fn open_store(cfg: &Config) -> Result<Arc<SqliteVectorStore>> {
    let pool = db::connect(cfg).await?;
    let embedder = create_embedder(&cfg.embedding)?;
    Ok(Arc::new(SqliteVectorStore::new(pool, embedder)))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("errlens=info")),
        )
        .init();

    let cli = Cli::parse();
    // A missing config file means defaults; a malformed one is an error.
    let cfg = if cli.config.exists() {
        config::load_config(&cli.config)?
    } else {
        Config::default()
    };

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Seed => {
            let store = open_store(&cfg).await?;
            let indexer = Indexer::new(store.clone() as Arc<dyn VectorStore>, cfg.indexing.batch_size);
            let records = seed::sample_records();
            let written = indexer.index(&records).await?;
            println!("Indexed {} sample records ({} entries).", records.len(), written);
        }
        Commands::Ingest { file } => {
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let raw: Vec<serde_json::Value> =
                serde_json::from_str(&content).context("Expected a JSON array of log objects")?;
            let records: Vec<_> = raw
                .into_iter()
                .map(|v| RawLog::from(v).normalize())
                .collect();

            let store = open_store(&cfg).await?;
            let indexer = Indexer::new(store.clone() as Arc<dyn VectorStore>, cfg.indexing.batch_size);
            let written = indexer.index(&records).await?;
            println!("Indexed {} records ({} entries).", records.len(), written);
        }
        Commands::Search { query, service, k } => {
            let store = open_store(&cfg).await?;
            let filter = service.as_deref().map(|s| filter_on("service", s));
            let hits = store.similarity_search(&query, k, filter.as_ref()).await?;

            if hits.is_empty() {
                println!("No results.");
                return Ok(());
            }
            for (i, hit) in hits.iter().enumerate() {
                println!("{}. [{:.3}] {}", i + 1, hit.score, hit.text);
                println!(
                    "    service: {}  type: {}  code: {}  status: {}",
                    hit.metadata.service,
                    hit.metadata.error_type,
                    hit.metadata.error_code,
                    hit.metadata.resolution_status
                );
                if !hit.metadata.resolution_notes.is_empty() {
                    println!("    resolution: {}", hit.metadata.resolution_notes);
                }
                println!("    base_id: {}", hit.base_id);
                println!();
            }
        }
        Commands::Resolve {
            base_id,
            status,
            notes,
        } => {
            let status: ResolutionStatus = status.parse()?;
            let store = open_store(&cfg).await?;
            let tracker = ResolutionTracker::new(store as Arc<dyn VectorStore>);
            let touched = tracker.update(&base_id, status, &notes).await?;
            if touched == 0 {
                println!("No entries found for base id {}.", base_id);
            } else {
                println!("Updated {} entries to '{}'.", touched, status);
            }
        }
        Commands::Analyze {
            code,
            message,
            stack_trace,
            trace_id,
            service,
        } => {
            let store = open_store(&cfg).await?;
            let retriever = Retriever::new(store as Arc<dyn VectorStore>);
            let telemetry = Arc::new(HttpTelemetryClient::new(&cfg.telemetry)?);
            let analyst = Arc::new(OllamaAnalyst::new(&cfg.analysis)?);
            let pipeline = Pipeline::new(retriever, telemetry, analyst, &cfg);

            let state = pipeline
                .run(ErrorQuery {
                    code,
                    message,
                    stack_trace,
                    trace_id,
                    service,
                })
                .await;

            println!("Error Analysis and Suggested Resolutions:");
            println!();
            println!("{}", state.output.analysis);
            if !state.output.possible_causes.is_empty() {
                println!("\nPossible causes:");
                for cause in &state.output.possible_causes {
                    println!("  - {}", cause);
                }
            }
            if !state.output.recommendations.is_empty() {
                println!("\nRecommendations:");
                for rec in &state.output.recommendations {
                    println!("  - {}", rec);
                }
            }
        }
    }

    Ok(())
}
