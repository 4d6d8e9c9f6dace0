//! Analysis capability: turn assembled context into structured findings.
//!
//! The [`Analyst`] trait receives a [`ContextBundle`] (the error
//! descriptor plus whatever related-log and historical context the
//! pipeline managed to gather) and returns an
//! [`AnalysisOutput`](crate::models::AnalysisOutput). Implementations must
//! tolerate degraded or empty context fields.
//!
//! [`OllamaAnalyst`] prompts a local Ollama model for a JSON object; when
//! the model's output fails to parse, the raw text is preserved as the
//! analysis and the parse failure is flagged in the structured fields.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;

use crate::config::AnalysisConfig;
use crate::models::AnalysisOutput;

/// Everything the analysis step gets to see, already rendered to text.
#[derive(Debug, Clone, Default)]
pub struct ContextBundle {
    pub error_code: String,
    pub error_message: String,
    pub stack_trace: String,
    pub related_logs: String,
    pub historical_data: String,
}

impl ContextBundle {
    fn section(text: &str) -> &str {
        if text.is_empty() {
            "(none available)"
        } else {
            text
        }
    }

    /// Render the analysis prompt. Empty sections are marked explicitly so
    /// the model can note the absence of context instead of inventing it.
    pub fn render_prompt(&self) -> String {
        format!(
            "You are an AI assistant specialized in system error analysis.\n\n\
             Error Code:\n{}\n\n\
             Error Message:\n{}\n\n\
             Stack Trace:\n{}\n\n\
             Historical Data:\n{}\n\n\
             Related Logs:\n{}\n\n\
             Based on the above information, provide a detailed analysis of the error. \
             If context sections are unavailable, say so rather than speculating.\n\n\
             Respond with a single JSON object with exactly these keys: \
             \"analysis\" (string), \"possible_causes\" (array of strings), \
             \"recommendations\" (array of strings).",
            Self::section(&self.error_code),
            Self::section(&self.error_message),
            Self::section(&self.stack_trace),
            Self::section(&self.historical_data),
            Self::section(&self.related_logs),
        )
    }
}

#[async_trait]
pub trait Analyst: Send + Sync {
    async fn generate(&self, bundle: &ContextBundle) -> Result<AnalysisOutput>;
}

/// Parse the model's reply into structured output.
///
/// Tries the whole text as JSON first, then the outermost `{...}` span
/// (models like to wrap JSON in prose or code fences). A reply that still
/// doesn't parse becomes a degraded-but-complete output: the raw text is
/// kept as the analysis and the parse failure is called out explicitly.
pub fn parse_analysis_output(raw: &str) -> AnalysisOutput {
    if let Ok(out) = serde_json::from_str::<AnalysisOutput>(raw) {
        return out;
    }

    if let (Some(start), Some(end)) = (raw.find('{'), raw.rfind('}')) {
        if start < end {
            if let Ok(out) = serde_json::from_str::<AnalysisOutput>(&raw[start..=end]) {
                return out;
            }
        }
    }

    AnalysisOutput {
        analysis: raw.to_string(),
        possible_causes: vec!["structured output could not be parsed from the model reply".to_string()],
        recommendations: vec!["re-run the analysis or inspect the raw text above".to_string()],
    }
}

/// Analyst backed by a local Ollama server (`POST /api/generate`).
pub struct OllamaAnalyst {
    endpoint: String,
    model: String,
    temperature: f64,
    max_retries: u32,
    client: reqwest::Client,
}

impl OllamaAnalyst {
    pub fn new(config: &AnalysisConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_retries: config.max_retries,
            client,
        })
    }

    async fn generate_raw(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/api/generate", self.endpoint);
        let body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
            "format": "json",
            "options": { "temperature": self.temperature },
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self.client.post(&url).json(&body).send().await;
            match resp {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let json: serde_json::Value = response
                            .json()
                            .await
                            .context("Failed to parse Ollama generate response")?;
                        let text = json["response"]
                            .as_str()
                            .context("Malformed Ollama response: missing 'response' field")?;
                        return Ok(text.to_string());
                    }
                    if status.as_u16() == 429 || status.is_server_error() {
                        let text = response.text().await.unwrap_or_default();
                        last_err = Some(anyhow::anyhow!("Ollama error {}: {}", status, text));
                        continue;
                    }
                    let text = response.text().await.unwrap_or_default();
                    bail!("Ollama error {}: {}", status, text);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Analysis failed after retries")))
    }
}

#[async_trait]
impl Analyst for OllamaAnalyst {
    async fn generate(&self, bundle: &ContextBundle) -> Result<AnalysisOutput> {
        let raw = self.generate_raw(&bundle.render_prompt()).await?;
        Ok(parse_analysis_output(&raw))
    }
}
