//! AI narrative generation.
//!
//! The orchestrator only sees the `Summarizer` trait: it hands over a
//! structured `SummaryRequest` and gets narrative text back, or an
//! `ExternalService` error. There is no fallback narrative.

pub mod gemini;
pub mod prompt;

use chrono::NaiveDate;
use serde::Serialize;

use crate::domain::{AccountSummary, CampaignSummary, SummaryReport};
use crate::error::AppError;

pub use gemini::GeminiClient;

/// Structured input for the narrative, serialized as JSON into the prompt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRequest {
    pub client: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub account: AccountSummary,
    pub campaigns: Vec<CampaignSummary>,
}

impl SummaryRequest {
    pub fn new(client: &str, period_start: NaiveDate, period_end: NaiveDate, report: &SummaryReport) -> Self {
        Self {
            client: client.to_string(),
            period_start,
            period_end,
            account: report.account.clone(),
            campaigns: report.campaigns.clone(),
        }
    }
}

/// Plain-text narrative for the client documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Narrative {
    pub text: String,
}

impl Narrative {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// Paragraphs separated by blank lines.
    pub fn paragraphs(&self) -> impl Iterator<Item = &str> {
        self.text.split("\n\n").map(str::trim).filter(|p| !p.is_empty())
    }
}

pub trait Summarizer {
    fn summarize(&self, request: &SummaryRequest) -> Result<Narrative, AppError>;
}
