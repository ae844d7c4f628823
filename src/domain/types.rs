//! Shared domain types.
//!
//! These types are intentionally kept plain and serializable so they can be:
//!
//! - handed between pipeline stages as read-only snapshots
//! - exported to CSV/JSON
//! - passed to the AI, chart and document collaborators without conversion

use std::collections::BTreeSet;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Which export a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Traffic,
    Clicks,
    Weather,
}

impl SourceKind {
    pub const ALL: [SourceKind; 3] = [SourceKind::Traffic, SourceKind::Clicks, SourceKind::Weather];

    pub fn display_name(self) -> &'static str {
        match self {
            SourceKind::Traffic => "traffic",
            SourceKind::Clicks => "clicks",
            SourceKind::Weather => "weather",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Logical fields a source can declare in its schema.
///
/// The three weather columns (`weather_condition`, `temperature_c`,
/// `rainfall_mm`) are one context field: they always travel together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    CampaignId,
    Date,
    Location,
    Impressions,
    Clicks,
    Spend,
    Conversions,
    Weather,
}

impl Field {
    pub fn column_name(self) -> &'static str {
        match self {
            Field::CampaignId => "campaign_id",
            Field::Date => "date",
            Field::Location => "location",
            Field::Impressions => "impressions",
            Field::Clicks => "clicks",
            Field::Spend => "spend",
            Field::Conversions => "conversions",
            Field::Weather => "weather",
        }
    }
}

/// Weather observed for a campaign on a given day.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeatherContext {
    pub condition: Option<String>,
    pub temperature_c: Option<f64>,
    pub rainfall_mm: Option<f64>,
}

impl WeatherContext {
    pub fn is_empty(&self) -> bool {
        self.condition.is_none() && self.temperature_c.is_none() && self.rainfall_mm.is_none()
    }
}

/// One `(campaign_id, date)` observation from a single source.
///
/// Every value field is optional because each source only carries the columns
/// it owns. Counts are exact integers from ingestion onwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub campaign_id: String,
    pub date: NaiveDate,
    pub location: Option<String>,
    pub impressions: Option<u64>,
    pub clicks: Option<u64>,
    pub spend: Option<f64>,
    pub conversions: Option<u64>,
    pub weather: Option<WeatherContext>,
}

impl Record {
    /// A record with only the key set.
    pub fn keyed(campaign_id: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            campaign_id: campaign_id.into(),
            date,
            location: None,
            impressions: None,
            clicks: None,
            spend: None,
            conversions: None,
            weather: None,
        }
    }

    pub fn key(&self) -> (&str, NaiveDate) {
        (self.campaign_id.as_str(), self.date)
    }
}

/// A validated table from one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordSet {
    pub source: SourceKind,
    /// Fields declared by the source schema (as resolved by ingestion).
    pub columns: BTreeSet<Field>,
    pub records: Vec<Record>,
}

impl RecordSet {
    pub fn new(source: SourceKind, columns: impl IntoIterator<Item = Field>, records: Vec<Record>) -> Self {
        Self {
            source,
            columns: columns.into_iter().collect(),
            records,
        }
    }

    pub fn has_column(&self, field: Field) -> bool {
        self.columns.contains(&field)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// The ingested inputs of one run.
#[derive(Debug, Clone)]
pub struct SourceTables {
    pub traffic: RecordSet,
    pub clicks: RecordSet,
    pub weather: Option<RecordSet>,
}

/// One joined row: exactly one per `(campaign_id, date)` after merging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedRecord {
    pub campaign_id: String,
    pub date: NaiveDate,
    pub location: Option<String>,
    pub impressions: u64,
    pub clicks: u64,
    pub spend: f64,
    pub conversions: u64,
    pub weather: Option<WeatherContext>,
}

/// Merger output, ordered by `(campaign_id, date)` ascending.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MergedRecordSet {
    pub records: Vec<MergedRecord>,
}

impl MergedRecordSet {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Derived performance ratios.
///
/// `None` is the explicit "undefined" marker (zero denominator). A stored value
/// is always finite and non-negative.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Ratios {
    pub ctr: Option<f64>,
    pub cpc: Option<f64>,
    pub cpa: Option<f64>,
    pub cvr: Option<f64>,
}

impl Ratios {
    pub fn all_undefined(&self) -> bool {
        self.ctr.is_none() && self.cpc.is_none() && self.cpa.is_none() && self.cvr.is_none()
    }
}

/// A merged record extended with its derived metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsRow {
    #[serde(flatten)]
    pub record: MergedRecord,
    #[serde(flatten)]
    pub ratios: Ratios,
    /// Share of the account's total spend; set by the second metrics pass.
    pub spend_ratio: Option<f64>,
}

/// Summed raw counts. Ratios are always derived from these, never averaged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Totals {
    pub impressions: u64,
    pub clicks: u64,
    pub spend: f64,
    pub conversions: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignSummary {
    pub campaign_id: String,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
    /// Number of dated rows contributing to this campaign.
    pub days: usize,
    pub totals: Totals,
    pub ratios: Ratios,
    pub spend_ratio: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountSummary {
    pub campaign_count: usize,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    pub totals: Totals,
    pub ratios: Ratios,
}

/// Totals across all campaigns for one date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyTotals {
    pub date: NaiveDate,
    pub totals: Totals,
    pub ratios: Ratios,
}

/// Aggregation snapshot handed to the AI, chart and document stages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryReport {
    pub campaigns: Vec<CampaignSummary>,
    pub account: AccountSummary,
    pub daily: Vec<DailyTotals>,
}

/// How to resolve the same field arriving from two sources with different values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictMode {
    /// The source listed first in the precedence order wins.
    #[default]
    Precedence,
    /// Any disagreement is a merge conflict error.
    Reject,
}

/// Fill policy for non-numeric context fields (weather) missing for a key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextFill {
    /// Leave the field absent.
    #[default]
    Omit,
    /// Reuse the last known value of the same campaign, earlier in date order.
    CarryForward,
}

/// Join policy used by the merger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MergePolicy {
    /// Highest precedence first.
    #[serde(default = "default_precedence")]
    pub precedence: Vec<SourceKind>,
    #[serde(default)]
    pub on_conflict: ConflictMode,
    #[serde(default)]
    pub context_fill: ContextFill,
}

impl Default for MergePolicy {
    fn default() -> Self {
        Self {
            precedence: default_precedence(),
            on_conflict: ConflictMode::default(),
            context_fill: ContextFill::default(),
        }
    }
}

impl MergePolicy {
    /// Rank of a source in the precedence order (0 = highest).
    pub fn rank(&self, source: SourceKind) -> usize {
        self.precedence
            .iter()
            .position(|s| *s == source)
            .unwrap_or(self.precedence.len())
    }
}

fn default_precedence() -> Vec<SourceKind> {
    SourceKind::ALL.to_vec()
}

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Ingest,
    Merge,
    ComputeMetrics,
    Aggregate,
    Summarize,
    Visualize,
    Render,
}

impl Stage {
    pub const ORDER: [Stage; 7] = [
        Stage::Ingest,
        Stage::Merge,
        Stage::ComputeMetrics,
        Stage::Aggregate,
        Stage::Summarize,
        Stage::Visualize,
        Stage::Render,
    ];

    pub fn display_name(self) -> &'static str {
        match self {
            Stage::Ingest => "ingest",
            Stage::Merge => "merge",
            Stage::ComputeMetrics => "compute-metrics",
            Stage::Aggregate => "aggregate",
            Stage::Summarize => "summarize",
            Stage::Visualize => "visualize",
            Stage::Render => "render",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}
