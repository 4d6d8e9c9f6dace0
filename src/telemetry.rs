//! Telemetry-fetch capability.
//!
//! The [`TelemetryFetch`] trait covers the two query shapes the pipeline
//! needs: logs for one trace id, and recent error logs over a lookback
//! window. Results are raw attribute maps ([`RawLog`]) ordered by
//! timestamp; normalization happens at the caller's boundary.
//!
//! [`HttpTelemetryClient`] is the default implementation, querying a JSON
//! log-search endpoint.

use std::time::Duration as StdDuration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::Value;

use crate::config::TelemetryConfig;
use crate::normalize::RawLog;

#[async_trait]
pub trait TelemetryFetch: Send + Sync {
    /// Logs associated with one trace id within the lookback window.
    async fn fetch_by_trace(&self, trace_id: &str, lookback: Duration) -> Result<Vec<RawLog>>;

    /// Error logs across all services within the lookback window.
    async fn fetch_recent_errors(&self, lookback: Duration) -> Result<Vec<RawLog>>;
}

/// Telemetry client over a JSON log-search HTTP API.
///
/// Issues `GET {endpoint}/logs/search` with `query`, `from`, and `to`
/// parameters and accepts either a bare JSON array or an object with a
/// `data` or `logs` array.
pub struct HttpTelemetryClient {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpTelemetryClient {
    pub fn new(config: &TelemetryConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(StdDuration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            client,
        })
    }

    async fn search(&self, query: &str, lookback: Duration) -> Result<Vec<RawLog>> {
        let to = Utc::now();
        let from = to - lookback;
        let url = format!("{}/logs/search", self.endpoint);
        let from_ts = from.to_rfc3339();
        let to_ts = to.to_rfc3339();

        let response = self
            .client
            .get(&url)
            .query(&[
                ("query", query),
                ("from", from_ts.as_str()),
                ("to", to_ts.as_str()),
            ])
            .send()
            .await
            .with_context(|| format!("telemetry request to {} failed", url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("telemetry endpoint returned {}: {}", status, body);
        }

        let json: Value = response
            .json()
            .await
            .context("telemetry response was not valid JSON")?;
        Ok(parse_log_payload(json))
    }
}

/// Extract the log array from the common response envelopes and order it
/// by the `timestamp` attribute.
pub fn parse_log_payload(json: Value) -> Vec<RawLog> {
    let items = match json {
        Value::Array(items) => items,
        Value::Object(mut obj) => match obj.remove("data").or_else(|| obj.remove("logs")) {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };

    let mut logs: Vec<RawLog> = items.into_iter().map(RawLog::from).collect();
    logs.sort_by(|a, b| {
        let ts_a = a.0.get("timestamp").and_then(Value::as_str).unwrap_or("");
        let ts_b = b.0.get("timestamp").and_then(Value::as_str).unwrap_or("");
        ts_a.cmp(ts_b)
    });
    logs
}

#[async_trait]
impl TelemetryFetch for HttpTelemetryClient {
    async fn fetch_by_trace(&self, trace_id: &str, lookback: Duration) -> Result<Vec<RawLog>> {
        self.search(&format!("trace_id:{}", trace_id), lookback).await
    }

    async fn fetch_recent_errors(&self, lookback: Duration) -> Result<Vec<RawLog>> {
        self.search("status:error", lookback).await
    }
}
