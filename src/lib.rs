//! # errlens
//!
//! Error-log vector indexing, hybrid retrieval, and grounded incident
//! analysis.
//!
//! errlens ingests error-log records from a telemetry source, splits each
//! into a few semantically distinct fragments, and stores those fragments
//! in a vector index alongside structured, filterable metadata. When an
//! incident comes in, a fixed-stage pipeline gathers related logs and
//! similar historical errors and hands the merged context to an analysis
//! model.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌────────────────────────┐   ┌─────────────┐
//! │ Telemetry │──▶│ Normalize → Chunk → Id  │──▶│ VectorStore │
//! │  source   │   │      → Index            │   │ memory/SQLite│
//! └───────────┘   └────────────────────────┘   └──────┬──────┘
//!                                                     │
//!                  ┌──────────────────────────────────┤
//!                  ▼                                  ▼
//!            ┌──────────┐                      ┌────────────┐
//!            │ Pipeline │◀── related logs ───  │ Retriever  │
//!            │ (analyze)│◀── historical ctx ── │ + Tracker  │
//!            └──────────┘                      └────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`normalize`] | Raw telemetry attributes → canonical records |
//! | [`chunk`] | Fixed-template fragment builder |
//! | [`identity`] | Content-addressed vector identity |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`store`] | Vector-store capability (in-memory, SQLite) |
//! | [`index`] | Batched ingestion |
//! | [`retrieve`] | Similarity search with metadata filters |
//! | [`resolution`] | Resolution lifecycle updates |
//! | [`telemetry`] | Telemetry-fetch capability |
//! | [`analysis`] | LLM analysis capability |
//! | [`pipeline`] | Fixed-stage analysis workflow |
//! | [`seed`] | Built-in sample records |

pub mod analysis;
pub mod chunk;
pub mod config;
pub mod db;
pub mod embedding;
pub mod identity;
pub mod index;
pub mod migrate;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod resolution;
pub mod retrieve;
pub mod seed;
pub mod store;
pub mod telemetry;
