//! Per-record performance ratios.
//!
//! `compute` is pure and has no cross-record dependency, so `compute_all` runs
//! it as an order-preserving parallel map. `spend_ratio` needs the account
//! total and is filled in by a second pass (`compute_ratios`).
//!
//! Values are stored at full precision; rounding belongs to the report layer.

use rayon::prelude::*;
use tracing::info;

use crate::domain::{MergedRecord, MergedRecordSet, MetricsRow, Ratios};
use crate::error::AppError;

/// Apply the ratio formulas to one set of counts.
///
/// Used for single rows and for summed totals alike, so every level of the
/// report shares one definition.
pub fn ratios(impressions: u64, clicks: u64, spend: f64, conversions: u64) -> Ratios {
    let impressions = impressions as f64;
    let clicks = clicks as f64;
    let conversions = conversions as f64;
    Ratios {
        ctr: ratio(clicks, impressions),
        cpc: ratio(spend, clicks),
        cpa: ratio(spend, conversions),
        cvr: ratio(conversions, clicks),
    }
}

/// `numerator / denominator`, or undefined when the denominator is zero.
pub(crate) fn ratio(numerator: f64, denominator: f64) -> Option<f64> {
    if denominator > 0.0 {
        let v = numerator / denominator;
        if v.is_finite() && v >= 0.0 {
            return Some(v);
        }
    }
    None
}

/// Derive the per-row ratios. `spend_ratio` is left undefined.
pub fn compute(record: &MergedRecord) -> Result<MetricsRow, AppError> {
    if !(record.spend.is_finite() && record.spend >= 0.0) {
        return Err(AppError::computation(format!(
            "Invalid spend {} for ({}, {}).",
            record.spend, record.campaign_id, record.date
        )));
    }

    Ok(MetricsRow {
        record: record.clone(),
        ratios: ratios(record.impressions, record.clicks, record.spend, record.conversions),
        spend_ratio: None,
    })
}

/// Second pass: each row's share of the account's total spend.
pub fn compute_ratios(rows: Vec<MetricsRow>, account_total_spend: f64) -> Result<Vec<MetricsRow>, AppError> {
    if !(account_total_spend.is_finite() && account_total_spend >= 0.0) {
        return Err(AppError::computation(format!(
            "Invalid account total spend: {account_total_spend}"
        )));
    }

    Ok(rows
        .into_iter()
        .map(|row| MetricsRow {
            spend_ratio: ratio(row.record.spend, account_total_spend),
            ..row
        })
        .collect())
}

/// Compute metrics for every merged row, preserving input order.
pub fn compute_all(set: &MergedRecordSet) -> Result<Vec<MetricsRow>, AppError> {
    let rows: Vec<MetricsRow> = set
        .records
        .par_iter()
        .map(compute)
        .collect::<Result<_, _>>()?;

    let total_spend: f64 = rows.iter().map(|r| r.record.spend).sum();
    let rows = compute_ratios(rows, total_spend)?;

    info!(rows = rows.len(), total_spend, "computed row metrics");
    Ok(rows)
}
