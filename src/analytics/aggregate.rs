//! Campaign, account and daily roll-ups.
//!
//! Every level sums raw counts first and then applies the same ratio formulas
//! as a single row (`metrics::ratios`). Per-row ratios are never averaged.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::info;

use crate::analytics::metrics::{ratio, ratios};
use crate::domain::{
    AccountSummary, CampaignSummary, DailyTotals, MergedRecord, MetricsRow, Ratios, SummaryReport, Totals,
};
use crate::error::AppError;

impl Totals {
    /// Add one record; a count that no longer fits in `u64` is a computation error.
    pub fn add(&mut self, record: &MergedRecord) -> Result<(), AppError> {
        let sum = |total: u64, value: u64, name: &str| {
            total.checked_add(value).ok_or_else(|| {
                AppError::computation(format!(
                    "Total {name} overflows at ({}, {}).",
                    record.campaign_id, record.date
                ))
            })
        };
        self.impressions = sum(self.impressions, record.impressions, "impressions")?;
        self.clicks = sum(self.clicks, record.clicks, "clicks")?;
        self.conversions = sum(self.conversions, record.conversions, "conversions")?;
        self.spend += record.spend;
        Ok(())
    }

    pub fn ratios(&self) -> Ratios {
        ratios(self.impressions, self.clicks, self.spend, self.conversions)
    }
}

#[derive(Debug)]
struct CampaignGroup {
    totals: Totals,
    first_date: NaiveDate,
    last_date: NaiveDate,
    days: usize,
}

/// Roll rows up into per-campaign summaries (by `campaign_id` ascending) and
/// one account summary.
pub fn aggregate(rows: &[MetricsRow]) -> Result<(Vec<CampaignSummary>, AccountSummary), AppError> {
    let mut groups: BTreeMap<&str, CampaignGroup> = BTreeMap::new();
    let mut account = Totals::default();
    let mut span: Option<(NaiveDate, NaiveDate)> = None;

    for row in rows {
        let r = &row.record;
        account.add(r)?;
        span = Some(match span {
            None => (r.date, r.date),
            Some((lo, hi)) => (lo.min(r.date), hi.max(r.date)),
        });

        let group = groups.entry(r.campaign_id.as_str()).or_insert_with(|| CampaignGroup {
            totals: Totals::default(),
            first_date: r.date,
            last_date: r.date,
            days: 0,
        });
        group.totals.add(r)?;
        group.first_date = group.first_date.min(r.date);
        group.last_date = group.last_date.max(r.date);
        group.days += 1;
    }

    let campaigns: Vec<CampaignSummary> = groups
        .into_iter()
        .map(|(campaign_id, g)| CampaignSummary {
            campaign_id: campaign_id.to_string(),
            first_date: g.first_date,
            last_date: g.last_date,
            days: g.days,
            ratios: g.totals.ratios(),
            spend_ratio: ratio(g.totals.spend, account.spend),
            totals: g.totals,
        })
        .collect();

    let summary = AccountSummary {
        campaign_count: campaigns.len(),
        first_date: span.map(|(lo, _)| lo),
        last_date: span.map(|(_, hi)| hi),
        ratios: account.ratios(),
        totals: account,
    };

    Ok((campaigns, summary))
}

/// Totals across campaigns per date, ascending.
pub fn daily_totals(rows: &[MetricsRow]) -> Result<Vec<DailyTotals>, AppError> {
    let mut by_date: BTreeMap<NaiveDate, Totals> = BTreeMap::new();
    for row in rows {
        by_date.entry(row.record.date).or_default().add(&row.record)?;
    }
    Ok(by_date
        .into_iter()
        .map(|(date, totals)| DailyTotals {
            date,
            ratios: totals.ratios(),
            totals,
        })
        .collect())
}

/// Build the full aggregation snapshot used by the downstream stages.
pub fn summarize(rows: &[MetricsRow]) -> Result<SummaryReport, AppError> {
    let (campaigns, account) = aggregate(rows)?;
    let daily = daily_totals(rows)?;
    info!(
        campaigns = campaigns.len(),
        days = daily.len(),
        impressions = account.totals.impressions,
        clicks = account.totals.clicks,
        spend = account.totals.spend,
        "aggregated metrics"
    );
    Ok(SummaryReport {
        campaigns,
        account,
        daily,
    })
}
