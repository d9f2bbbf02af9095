//! # Explainer Client
//!
//! Requests a neutral natural-language explanation of conflicting check
//! outcomes. The text is advisory: it is attached to a resolution but never
//! read by the decision logic.
//!
//! [`HttpExplainer`] speaks the generate API of a local model server:
//! `POST {base_url}/api/generate` with `{model, prompt, stream: false}`,
//! reading the `response` field of the reply.

use async_trait::async_trait;
use icx_core::Amount;
use serde::{Deserialize, Serialize};

use crate::config::ExplainerConfig;
use crate::error::ExplainError;
use crate::retry::retry_send;

/// Small structured context handed to the explainer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplainContext {
    pub invoice_id: String,
    pub counterparty_id: Option<String>,
    pub amount: Option<Amount>,
}

/// Source of advisory explanations.
#[async_trait]
pub trait Explainer: Send + Sync {
    async fn explain(&self, context: &ExplainContext, conflicts: &[String]) -> Result<String, ExplainError>;
}

/// HTTP explainer with bounded transport retries.
#[derive(Debug)]
pub struct HttpExplainer {
    http: reqwest::Client,
    url: String,
    model: String,
    max_retries: u32,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: Option<String>,
}

impl HttpExplainer {
    pub fn new(config: &ExplainerConfig) -> Result<Self, ExplainError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ExplainError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            url: format!("{}/api/generate", config.base_url.as_str().trim_end_matches('/')),
            model: config.model.clone(),
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl Explainer for HttpExplainer {
    async fn explain(&self, context: &ExplainContext, conflicts: &[String]) -> Result<String, ExplainError> {
        let prompt = build_prompt(context, conflicts);
        let body = GenerateRequest {
            model: &self.model,
            prompt: &prompt,
            stream: false,
        };

        let resp = retry_send(self.max_retries, || self.http.post(&self.url).json(&body).send()).await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ExplainError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateResponse = resp.json().await?;
        parsed.response.ok_or(ExplainError::MissingResponse)
    }
}

/// Prompt asking for both readings of the conflicts, without a verdict.
pub fn build_prompt(context: &ExplainContext, conflicts: &[String]) -> String {
    let context_json = serde_json::to_string_pretty(context).unwrap_or_else(|_| context.invoice_id.clone());
    let conflict_lines: String = conflicts.iter().map(|c| format!("- {c}\n")).collect();
    format!(
        "You are a compliance reasoning assistant.\n\
         Explain both interpretations neutrally.\n\
         Do NOT make a decision.\n\n\
         Context:\n{context_json}\n\n\
         Conflicts:\n{conflict_lines}"
    )
}

/// Turn free-form explanation text into clean bullet points.
///
/// Leading bullets, digits and dots are stripped, blank lines dropped and
/// lines opening with "based on" discarded.
pub fn normalize_explanation(text: &str) -> Vec<String> {
    text.lines()
        .map(|line| {
            line.trim()
                .trim_start_matches(|c: char| matches!(c, '-' | '•' | '.' | ' ' | '*') || c.is_ascii_digit())
                .trim()
        })
        .filter(|line| !line.is_empty())
        .filter(|line| !line.to_lowercase().starts_with("based on"))
        .map(str::to_string)
        .collect()
}
