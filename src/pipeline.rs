//! The error-analysis workflow.
//!
//! A fixed-order pipeline with no branching back:
//!
//! ```text
//! select_capabilities → gather_related_logs → gather_historical_context → analyze → done
//! ```
//!
//! Each stage reads the state written before it and fills in its own
//! fields. A failure inside a stage is caught there, logged, and leaves
//! that stage's output at its default; the pipeline always reaches the
//! end and always yields an output, degraded if necessary.

use std::sync::Arc;

use chrono::Duration;
use tracing::warn;

use crate::analysis::{Analyst, ContextBundle};
use crate::config::Config;
use crate::models::{AnalysisOutput, AnalysisState, Capability, ErrorQuery, LogRecord};
use crate::retrieve::{render_context, Retriever};
use crate::store::filter_on;
use crate::telemetry::TelemetryFetch;

/// Keywords that make the documentation capability look relevant.
const DOC_HINTS: &[&str] = &["api", "endpoint", "http", "request", "contract"];

pub struct Pipeline {
    retriever: Retriever,
    telemetry: Arc<dyn TelemetryFetch>,
    analyst: Arc<dyn Analyst>,
    trace_lookback: Duration,
    recent_lookback: Duration,
    top_k: usize,
}

impl Pipeline {
    pub fn new(
        retriever: Retriever,
        telemetry: Arc<dyn TelemetryFetch>,
        analyst: Arc<dyn Analyst>,
        config: &Config,
    ) -> Self {
        Self {
            retriever,
            telemetry,
            analyst,
            trace_lookback: Duration::hours(config.telemetry.trace_lookback_hours),
            recent_lookback: Duration::hours(config.telemetry.recent_lookback_hours),
            top_k: config.retrieval.top_k,
        }
    }

    /// Run the full workflow for one error descriptor. Infallible: every
    /// stage recovers locally, so the returned state always carries an
    /// output.
    pub async fn run(&self, query: ErrorQuery) -> AnalysisState {
        let mut state = AnalysisState::new(query);
        state.capabilities = select_capabilities(&state.query);
        self.gather_related_logs(&mut state).await;
        self.gather_historical_context(&mut state).await;
        self.analyze(&mut state).await;
        state
    }

    /// Fetch logs scoped to the query's trace id, falling back to recent
    /// errors when the trace yields nothing. Backfills the descriptor's
    /// service from the first related log when unset.
    async fn gather_related_logs(&self, state: &mut AnalysisState) {
        if !state.capabilities.contains(&Capability::Telemetry) {
            return;
        }

        let mut logs: Vec<LogRecord> = Vec::new();

        if let Some(trace_id) = state.query.trace_id.clone() {
            match self.telemetry.fetch_by_trace(&trace_id, self.trace_lookback).await {
                Ok(raw) => logs = raw.iter().map(|r| r.normalize()).collect(),
                Err(e) => warn!(error = %e, trace_id, "trace-scoped log fetch failed"),
            }
        }

        if logs.is_empty() {
            match self.telemetry.fetch_recent_errors(self.recent_lookback).await {
                Ok(raw) => logs = raw.iter().map(|r| r.normalize()).collect(),
                Err(e) => warn!(error = %e, "recent-errors fetch failed"),
            }
        }

        if state.query.service.is_none() {
            if let Some(first) = logs.first() {
                if first.service != "unknown" {
                    state.query.service = Some(first.service.clone());
                }
            }
        }

        state.related_logs = logs;
    }

    /// Query the vector index for similar historical errors, filtered to
    /// the descriptor's service when known. Retrieval failures already
    /// degrade to an empty result inside the retriever.
    async fn gather_historical_context(&self, state: &mut AnalysisState) {
        if !state.capabilities.contains(&Capability::HistoricalSearch) {
            return;
        }

        let filter = state
            .query
            .service
            .as_deref()
            .map(|s| filter_on("service", s));
        let hits = self
            .retriever
            .search_with_text(&state.query.message, filter.as_ref(), self.top_k)
            .await;
        state.historical_context = render_context(&hits);
    }

    /// Merge everything into one bundle and delegate to the analyst. An
    /// analyst failure is caught here and replaced by a degraded output.
    async fn analyze(&self, state: &mut AnalysisState) {
        let bundle = ContextBundle {
            error_code: state.query.code.clone(),
            error_message: state.query.message.clone(),
            stack_trace: state.query.stack_trace.clone(),
            related_logs: state
                .related_logs
                .iter()
                .map(LogRecord::render)
                .collect::<Vec<_>>()
                .join("\n"),
            historical_data: state.historical_context.clone(),
        };

        state.output = match self.analyst.generate(&bundle).await {
            Ok(output) => output,
            Err(e) => {
                warn!(error = %e, "analysis stage failed; producing degraded output");
                AnalysisOutput::degraded(&e.to_string())
            }
        };
    }
}

/// Decide which capabilities look relevant to the descriptor. Advisory:
/// stages only skip work when their capability is absent from the result.
pub fn select_capabilities(query: &ErrorQuery) -> Vec<Capability> {
    let mut caps = vec![Capability::Telemetry, Capability::HistoricalSearch];

    let haystack = format!("{} {}", query.message, query.stack_trace).to_lowercase();
    if DOC_HINTS.iter().any(|hint| haystack.contains(hint)) {
        caps.push(Capability::Documentation);
    }

    caps
}
