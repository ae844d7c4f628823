//! Run configuration.
//!
//! The binary loads one YAML file and hands the resulting `RunConfig` to the
//! orchestrator. Nothing below the binary reads environment variables: the API
//! key is resolved up front through `LlmSettings::resolve_api_key`.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::{MergePolicy, SourceKind};
use crate::error::AppError;

pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-preview-09-2025";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    pub data_sources: DataSources,
    pub report: ReportSettings,
    #[serde(default)]
    pub llm: LlmSettings,
    #[serde(default)]
    pub merge: MergePolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DataSources {
    pub traffic_csv: PathBuf,
    pub clicks_csv: PathBuf,
    #[serde(default)]
    pub weather_csv: Option<PathBuf>,
}

/// Client-facing documents produced by the render stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Self-contained HTML report with inline charts.
    Html,
    /// Markdown slide deck, one slide per section.
    Slides,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReportSettings {
    pub client_name: String,
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    pub output_dir: PathBuf,
    #[serde(default = "default_output_formats")]
    pub output_formats: Vec<OutputFormat>,
    /// Also write `dataset.csv` and `summary.json` next to the documents.
    #[serde(default)]
    pub export_dataset: bool,
    /// Day-over-day impression drop (fraction) flagged as an anomaly.
    #[serde(default = "default_anomaly_drop_threshold")]
    pub anomaly_drop_threshold: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LlmSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Inline key; takes precedence over `api_key_env`.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Retries after a failed first attempt, for transport failures and
    /// timeouts only (non-2xx is never retried).
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: default_endpoint(),
            model: default_model(),
            api_key: None,
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
            retries: default_retries(),
            max_output_tokens: default_max_output_tokens(),
        }
    }
}

impl LlmSettings {
    /// Resolve the API key: inline value first, then the named variable.
    ///
    /// `lookup` is the variable source (the process environment in the binary).
    pub fn resolve_api_key(&self, lookup: impl Fn(&str) -> Option<String>) -> Result<String, AppError> {
        if let Some(key) = self.api_key.as_deref().map(str::trim).filter(|k| !k.is_empty()) {
            return Ok(key.to_string());
        }
        lookup(&self.api_key_env)
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                AppError::config(format!(
                    "No API key: set `llm.api_key` or the `{}` environment variable.",
                    self.api_key_env
                ))
            })
    }
}

fn default_true() -> bool {
    true
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_retries() -> u32 {
    3
}

fn default_max_output_tokens() -> u32 {
    4096
}

fn default_output_formats() -> Vec<OutputFormat> {
    vec![OutputFormat::Html, OutputFormat::Slides]
}

fn default_anomaly_drop_threshold() -> f64 {
    0.3
}

impl RunConfig {
    /// Load, resolve relative paths against the file's directory, and validate.
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| AppError::io(format!("Failed to read config '{}': {e}", path.display())))?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_yaml_str(&text, base_dir)
    }

    pub fn from_yaml_str(text: &str, base_dir: &Path) -> Result<Self, AppError> {
        let mut config: RunConfig =
            serde_yaml::from_str(text).map_err(|e| AppError::config(format!("Invalid config: {e}")))?;
        config.resolve_paths(base_dir);
        config.validate()?;
        Ok(config)
    }

    fn resolve_paths(&mut self, base_dir: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base_dir.join(&*p);
            }
        };
        resolve(&mut self.data_sources.traffic_csv);
        resolve(&mut self.data_sources.clicks_csv);
        if let Some(p) = self.data_sources.weather_csv.as_mut() {
            resolve(p);
        }
        resolve(&mut self.report.output_dir);
    }

    pub fn validate(&self) -> Result<(), AppError> {
        let report = &self.report;
        if report.client_name.trim().is_empty() {
            return Err(AppError::config("`report.client_name` must not be empty."));
        }
        if report.week_end < report.week_start {
            return Err(AppError::config(format!(
                "`report.week_end` ({}) is before `report.week_start` ({}).",
                report.week_end, report.week_start
            )));
        }
        if report.output_formats.is_empty() {
            return Err(AppError::config("`report.output_formats` must list at least one format."));
        }
        let t = report.anomaly_drop_threshold;
        if !(t.is_finite() && t > 0.0 && t < 1.0) {
            return Err(AppError::config("`report.anomaly_drop_threshold` must be in (0, 1)."));
        }

        if !self.llm.enabled {
            return Err(AppError::config(
                "`llm.enabled` is false, but every report requires an AI narrative.",
            ));
        }
        if self.llm.timeout_secs == 0 {
            return Err(AppError::config("`llm.timeout_secs` must be > 0."));
        }
        if self.llm.endpoint.trim().is_empty() || self.llm.model.trim().is_empty() {
            return Err(AppError::config("`llm.endpoint` and `llm.model` must not be empty."));
        }

        let precedence = &self.merge.precedence;
        let unique: HashSet<SourceKind> = precedence.iter().copied().collect();
        if precedence.len() != SourceKind::ALL.len() || unique.len() != SourceKind::ALL.len() {
            return Err(AppError::config(
                "`merge.precedence` must list traffic, clicks and weather exactly once.",
            ));
        }

        Ok(())
    }

    /// File stem shared by every document of a run.
    pub fn base_file_name(&self) -> String {
        format!(
            "{}_{}_to_{}",
            self.report.client_name.trim().replace(' ', "_"),
            self.report.week_start,
            self.report.week_end
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ConflictMode, ContextFill};
    use crate::error::ErrorKind;

    const MINIMAL: &str = "
data_sources:
  traffic_csv: data/traffic.csv
  clicks_csv: /abs/clicks.csv
report:
  client_name: Acme Retail
  week_start: 2025-01-01
  week_end: 2025-01-07
  output_dir: out
";

    #[test]
    fn minimal_config_gets_defaults_and_resolved_paths() {
        let config = RunConfig::from_yaml_str(MINIMAL, Path::new("/etc/insight")).unwrap();
        assert_eq!(config.data_sources.traffic_csv, PathBuf::from("/etc/insight/data/traffic.csv"));
        assert_eq!(config.data_sources.clicks_csv, PathBuf::from("/abs/clicks.csv"));
        assert_eq!(config.report.output_dir, PathBuf::from("/etc/insight/out"));
        assert!(config.data_sources.weather_csv.is_none());
        assert_eq!(config.report.output_formats, vec![OutputFormat::Html, OutputFormat::Slides]);
        assert_eq!(config.llm.timeout_secs, 60);
        assert_eq!(config.merge.on_conflict, ConflictMode::Precedence);
        assert_eq!(config.merge.context_fill, ContextFill::Omit);
        assert_eq!(config.base_file_name(), "Acme_Retail_2025-01-01_to_2025-01-07");
    }

    #[test]
    fn disabled_llm_is_rejected() {
        let text = format!("{MINIMAL}llm:\n  enabled: false\n");
        let err = RunConfig::from_yaml_str(&text, Path::new(".")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn zero_retries_is_a_single_attempt_config() {
        let text = format!("{MINIMAL}llm:\n  retries: 0\n");
        let config = RunConfig::from_yaml_str(&text, Path::new(".")).unwrap();
        assert_eq!(config.llm.retries, 0);
    }

    #[test]
    fn precedence_must_be_a_permutation() {
        let text = format!("{MINIMAL}merge:\n  precedence: [traffic, traffic, weather]\n");
        assert!(RunConfig::from_yaml_str(&text, Path::new(".")).is_err());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let text = format!("{MINIMAL}extra: 1\n");
        assert!(RunConfig::from_yaml_str(&text, Path::new(".")).is_err());
    }

    #[test]
    fn inverted_week_is_rejected() {
        let text = MINIMAL.replace("week_end: 2025-01-07", "week_end: 2024-12-31");
        assert!(RunConfig::from_yaml_str(&text, Path::new(".")).is_err());
    }

    #[test]
    fn api_key_prefers_inline_value() {
        let mut llm = LlmSettings::default();
        let env = |name: &str| (name == "GEMINI_API_KEY").then(|| "from-env".to_string());
        assert_eq!(llm.resolve_api_key(env).unwrap(), "from-env");

        llm.api_key = Some("inline".to_string());
        assert_eq!(llm.resolve_api_key(env).unwrap(), "inline");

        llm.api_key = None;
        let err = llm.resolve_api_key(|_| None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }
}
