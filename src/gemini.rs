//! Gemini `generateContent` client and the prompts built on top of it.

use axum::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;

const GEMINI_API: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const MODEL: &str = "gemini-2.5-flash";

/// Domains per classification request.
pub const BATCH_SIZE: usize = 20;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no Gemini API key configured")]
    MissingApiKey,
    #[error("gemini request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("gemini returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("gemini returned no text")]
    Empty,
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, Error>;
}

#[derive(Clone)]
pub struct Gemini {
    http: Client,
    api_key: Option<String>,
}

impl std::fmt::Debug for Gemini {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gemini")
            .field("configured", &self.api_key.is_some())
            .finish()
    }
}

impl Gemini {
    pub fn new(http: Client, api_key: Option<String>) -> Self {
        Self { http, api_key }
    }
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[async_trait]
impl LanguageModel for Gemini {
    async fn generate(&self, prompt: &str) -> Result<String, Error> {
        let api_key = self.api_key.as_deref().ok_or(Error::MissingApiKey)?;

        let response = self
            .http
            .post(format!("{GEMINI_API}/{MODEL}:generateContent"))
            .query(&[("key", api_key)])
            .json(&json!({ "contents": [{ "parts": [{ "text": prompt }] }] }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Status { status, body });
        }

        let body: GenerateResponse = response.json().await?;
        let text = body
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| {
                c.parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<String>()
            })
            .filter(|t| !t.trim().is_empty())
            .ok_or(Error::Empty)?;

        Ok(text.trim().to_string())
    }
}

#[derive(Deserialize)]
struct EntertainmentResults {
    results: Vec<EntertainmentRow>,
}

#[derive(Deserialize)]
struct EntertainmentRow {
    domain: String,
    entertainment: bool,
}

fn entertainment_prompt(batch: &[String]) -> String {
    format!(
        r#"
Classify each domain as entertainment/social/dating or not.

Return ONLY JSON:
{{
 "results": [
   {{"domain": "...", "entertainment": true/false}}
 ]
}}

Domains: {batch:?}
"#
    )
}

/// Removes markdown code fences models like to wrap JSON in.
pub fn strip_code_fences(text: &str) -> &str {
    let text = text.trim();
    let text = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
        .unwrap_or(text);
    text.strip_suffix("```").unwrap_or(text).trim()
}

fn parse_entertainment(text: &str) -> Result<Vec<EntertainmentRow>, serde_json::Error> {
    serde_json::from_str::<EntertainmentResults>(strip_code_fences(text)).map(|r| r.results)
}

/// Asks the model which domains are entertainment, social or dating
/// services. A failed batch marks all of its domains `false`.
pub async fn classify_entertainment<M>(model: &M, domains: &[String]) -> HashMap<String, bool>
where
    M: LanguageModel + ?Sized,
{
    let mut verdicts = HashMap::new();

    for batch in domains.chunks(BATCH_SIZE) {
        let rows = match model.generate(&entertainment_prompt(batch)).await {
            Ok(text) => parse_entertainment(&text).map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };

        match rows {
            Ok(rows) => {
                for row in rows {
                    verdicts.insert(row.domain, row.entertainment);
                }
            }
            Err(err) => {
                tracing::warn!(batch = batch.len(), "entertainment classification failed: {}", err);
                for domain in batch {
                    verdicts.insert(domain.clone(), false);
                }
            }
        }
    }

    verdicts
}

/// Prompt for drafting a reply to `thread_text`.
pub fn reply_prompt(thread_text: &str) -> String {
    format!(
        r#"
You are an assistant that drafts professional and natural email replies.

Below is the full email thread. Summaries and clean replies are allowed.
Do NOT hallucinate details. Maintain the same tone and context.

THREAD:
{thread_text}

Write a helpful reply:
"#
    )
}
