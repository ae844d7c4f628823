//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - source tables and their records (`RecordSet`, `Record`)
//! - the merged dataset and derived metrics (`MergedRecordSet`, `MetricsRow`)
//! - aggregation snapshots (`CampaignSummary`, `AccountSummary`, `SummaryReport`)
//! - merge policy and pipeline stage enums

pub mod types;

pub use types::*;
