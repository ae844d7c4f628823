//! Gemini `generateContent` client.

use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::{info, warn};

use crate::ai::prompt::{SYSTEM_PROMPT, clean_markdown, user_prompt};
use crate::ai::{Narrative, Summarizer, SummaryRequest};
use crate::config::LlmSettings;
use crate::error::AppError;

/// Longest error body echoed back in messages.
const MAX_ERROR_BODY: usize = 300;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl ClientError {
    fn is_retryable(&self) -> bool {
        matches!(self, ClientError::Timeout(_) | ClientError::Transport(_))
    }
}

impl From<ClientError> for AppError {
    fn from(e: ClientError) -> Self {
        AppError::external(format!("Gemini request failed: {e}"))
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

pub struct GeminiClient {
    client: Client,
    url: String,
    api_key: String,
    timeout: Duration,
    attempts: u32,
    backoff: Duration,
    max_output_tokens: u32,
}

impl GeminiClient {
    pub fn new(settings: &LlmSettings, api_key: String) -> Result<Self, AppError> {
        let timeout = Duration::from_secs(settings.timeout_secs);
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::config(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: format!(
                "{}/models/{}:generateContent",
                settings.endpoint.trim_end_matches('/'),
                settings.model
            ),
            api_key,
            timeout,
            attempts: settings.retries.saturating_add(1),
            backoff: Duration::from_secs(1),
            max_output_tokens: settings.max_output_tokens,
        })
    }

    /// Base delay before the first retry; doubles on each further attempt.
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Send one prompt and return the joined candidate text, retrying
    /// transport failures and timeouts up to `retries` times.
    pub fn generate(&self, system: &str, user: &str) -> Result<String, ClientError> {
        let payload = json!({
            "systemInstruction": { "parts": [{ "text": system }] },
            "contents": [{ "role": "user", "parts": [{ "text": user }] }],
            "generationConfig": { "maxOutputTokens": self.max_output_tokens },
        });

        let mut attempt = 1;
        loop {
            match self.post(&payload) {
                Ok(text) => return Ok(text),
                Err(e) if e.is_retryable() && attempt < self.attempts => {
                    let delay = self.backoff.saturating_mul(2u32.saturating_pow(attempt - 1));
                    warn!(attempt, retry_in_ms = delay.as_millis() as u64, "Gemini request failed: {e}");
                    thread::sleep(delay);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn post(&self, payload: &serde_json::Value) -> Result<String, ClientError> {
        let resp = self
            .client
            .post(&self.url)
            .query(&[("key", &self.api_key)])
            .json(payload)
            .send()
            .map_err(|e| self.send_error(e))?;

        let status = resp.status();
        let body = resp.text().map_err(|e| self.send_error(e))?;
        if !status.is_success() {
            return Err(ClientError::Status {
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY).collect(),
            });
        }
        extract_text(&body)
    }

    fn send_error(&self, e: reqwest::Error) -> ClientError {
        if e.is_timeout() {
            ClientError::Timeout(self.timeout)
        } else {
            // The URL carries the API key.
            ClientError::Transport(e.without_url().to_string())
        }
    }
}

/// Join every candidate text part with blank lines.
fn extract_text(body: &str) -> Result<String, ClientError> {
    let parsed: GenerateResponse =
        serde_json::from_str(body).map_err(|e| ClientError::Malformed(format!("not a JSON response: {e}")))?;

    let texts: Vec<String> = parsed
        .candidates
        .into_iter()
        .filter_map(|c| c.content)
        .flat_map(|c| c.parts)
        .filter_map(|p| p.text)
        .filter(|t| !t.trim().is_empty())
        .collect();

    if texts.is_empty() {
        let snippet: String = body.chars().take(MAX_ERROR_BODY).collect();
        return Err(ClientError::Malformed(format!("no text in candidates: {snippet}")));
    }
    Ok(texts.join("\n\n"))
}

impl Summarizer for GeminiClient {
    fn summarize(&self, request: &SummaryRequest) -> Result<Narrative, AppError> {
        let user = user_prompt(request)?;
        info!(campaigns = request.campaigns.len(), "requesting narrative");
        let text = self.generate(SYSTEM_PROMPT, &user)?;
        let narrative = Narrative::new(clean_markdown(&text));
        if narrative.is_blank() {
            return Err(AppError::external("Gemini returned an empty narrative."));
        }
        Ok(narrative)
    }
}
