//! Prompt construction and response cleanup.

use std::sync::LazyLock;

use regex::Regex;

use crate::ai::SummaryRequest;
use crate::error::AppError;

pub const SYSTEM_PROMPT: &str = "You are a senior performance marketing analyst. \
You always follow formatting instructions strictly and never return markdown.";

const FORMAT_RULES: &str = "\
IMPORTANT FORMAT RULES:
- Do NOT use markdown.
- Do NOT use headings, bold, italics, asterisks (*) or underscores (_).
- Write in plain English sentences only, in paragraphs separated by blank lines.
- Do not use bullet symbols or numbered lists.";

const TASK: &str = "\
TASK:
Write a concise, executive-friendly weekly performance summary in 3 short sections:
Overall performance: how the account performed this week, in 2 to 3 sentences.
Key campaign insights: which campaigns did well or poorly, focusing on conversions, CTR and CPA. \
Mention campaigns by name.
Recommendations: 1 to 3 clear actions for next week.

Ratios in the data are fractions (ctr 0.05 means 5%). A null ratio is undefined \
because its denominator was zero; do not describe it as zero.";

/// User turn: formatting rules, the request as JSON, and the task.
pub fn user_prompt(request: &SummaryRequest) -> Result<String, AppError> {
    let data = serde_json::to_string_pretty(request)
        .map_err(|e| AppError::computation(format!("Failed to serialize summary request: {e}")))?;
    Ok(format!(
        "You are a senior marketing data analyst. Explain campaign performance clearly \
to a non-technical client.\n\n{FORMAT_RULES}\n\nClient name: {}\nReporting period: {} to {}\n\n\
Performance data (JSON):\n{data}\n\n{TASK}",
        request.client, request.period_start, request.period_end
    ))
}

static HEADING: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^#{1,6}[ \t]*").expect("valid regex"));
static BOLD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*\*(.*?)\*\*").expect("valid regex"));
static ITALIC_STAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*(.*?)\*").expect("valid regex"));
// Word-bounded so identifiers like `camp_01_x` survive.
static ITALIC_UNDERSCORE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(^|[^\w])_([^_\n]+)_([^\w]|$)").expect("valid regex"));
static BLANK_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

/// Strip markdown the model may still produce.
pub fn clean_markdown(text: &str) -> String {
    let text = text.replace("\r\n", "\n");
    let text = HEADING.replace_all(&text, "");
    let text = BOLD.replace_all(&text, "$1");
    let text = ITALIC_STAR.replace_all(&text, "$1");
    let text = ITALIC_UNDERSCORE.replace_all(&text, "${1}${2}${3}");
    let text = text.replace('*', "");
    let text = BLANK_RUNS.replace_all(&text, "\n\n");
    text.trim().to_string()
}
