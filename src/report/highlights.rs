//! Deterministic report sections: highlights, wins, concerns, recommendations
//! and day-over-day traffic anomalies.
//!
//! Campaigns with an undefined ratio are left out of rankings on that ratio.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::domain::{CampaignSummary, MetricsRow, SummaryReport};
use crate::error::AppError;
use crate::report::format::{fmt_count, fmt_money, fmt_money_opt, fmt_pct};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Highlights {
    pub key_highlights: Vec<String>,
    pub top_wins: Vec<String>,
    pub concerns: Vec<String>,
    pub recommendations: Vec<String>,
    pub anomalies: Vec<Anomaly>,
}

/// A day-over-day impressions drop for one location (or one campaign when
/// rows carry no location).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Anomaly {
    pub scope: String,
    pub date: NaiveDate,
    pub previous_impressions: u64,
    pub impressions: u64,
    /// Fractional drop, e.g. 0.42 for 42%.
    pub drop: f64,
    /// Mean reported rainfall for the scope that day.
    pub rainfall_mm: Option<f64>,
}

impl Anomaly {
    pub fn describe(&self) -> String {
        let mut msg = format!(
            "Traffic dropped {:.1}% in {} on {} (impressions {} vs {} previous day).",
            self.drop * 100.0,
            self.scope,
            self.date,
            fmt_count(self.impressions),
            fmt_count(self.previous_impressions)
        );
        if let Some(rain) = self.rainfall_mm {
            msg.push_str(&format!(" Reported rainfall: {rain:.1}mm."));
        }
        msg
    }
}

pub fn build_highlights(
    report: &SummaryReport,
    rows: &[MetricsRow],
    drop_threshold: f64,
) -> Result<Highlights, AppError> {
    Ok(Highlights {
        key_highlights: key_highlights(report),
        top_wins: top_wins(&report.campaigns),
        concerns: concerns(&report.campaigns),
        recommendations: recommendations(&report.campaigns),
        anomalies: detect_anomalies(rows, drop_threshold)?,
    })
}

fn key_highlights(report: &SummaryReport) -> Vec<String> {
    let a = &report.account;
    let mut out = vec![
        format!(
            "Campaigns delivered {} impressions, {} clicks and {} conversions on {} spend.",
            fmt_count(a.totals.impressions),
            fmt_count(a.totals.clicks),
            fmt_count(a.totals.conversions),
            fmt_money(a.totals.spend)
        ),
        format!(
            "Overall CTR was {} with a CPC of {} and a CPA of {}.",
            fmt_pct(a.ratios.ctr),
            fmt_money_opt(a.ratios.cpc),
            fmt_money_opt(a.ratios.cpa)
        ),
    ];

    let campaigns = &report.campaigns;
    let top_conv = by_conversions_desc(campaigns).into_iter().next();
    if let Some(c) = top_conv {
        out.push(format!(
            "Top converting campaign: {} with {} conversions and a CPA of {}.",
            c.campaign_id,
            fmt_count(c.totals.conversions),
            fmt_money_opt(c.ratios.cpa)
        ));
    }
    if let Some(c) = ranked(campaigns, |c| c.ratios.ctr, true).into_iter().next() {
        if top_conv.is_none_or(|t| t.campaign_id != c.campaign_id) {
            out.push(format!("Best CTR: {} at {}.", c.campaign_id, fmt_pct(c.ratios.ctr)));
        }
    }
    if let Some(c) = ranked(campaigns, |c| c.ratios.cpa, true).into_iter().next() {
        out.push(format!(
            "Key cost risk: {} has the highest CPA at {}.",
            c.campaign_id,
            fmt_money_opt(c.ratios.cpa)
        ));
    }
    out
}

fn top_wins(campaigns: &[CampaignSummary]) -> Vec<String> {
    let mut out: Vec<String> = by_conversions_desc(campaigns)
        .into_iter()
        .take(2)
        .filter(|c| c.totals.conversions > 0)
        .map(|c| {
            format!(
                "{} delivered {} conversions at a CPA of {}, making it a strong driver of performance.",
                c.campaign_id,
                fmt_count(c.totals.conversions),
                fmt_money_opt(c.ratios.cpa)
            )
        })
        .collect();
    if let Some(c) = ranked(campaigns, |c| c.ratios.cpa, false).into_iter().next() {
        out.push(format!(
            "{} achieved the lowest CPA at {}, indicating high efficiency.",
            c.campaign_id,
            fmt_money_opt(c.ratios.cpa)
        ));
    }
    out
}

fn concerns(campaigns: &[CampaignSummary]) -> Vec<String> {
    let mut out: Vec<String> = ranked(campaigns, |c| c.ratios.cpa, true)
        .into_iter()
        .take(2)
        .map(|c| {
            format!(
                "{} shows elevated CPA at {} with {} conversions, suggesting room for optimization.",
                c.campaign_id,
                fmt_money_opt(c.ratios.cpa),
                fmt_count(c.totals.conversions)
            )
        })
        .collect();
    if let Some(c) = by_conversions_desc(campaigns).into_iter().last() {
        out.push(format!(
            "{} has the lowest conversion volume ({} conversions) and may need a creative or targeting refresh.",
            c.campaign_id,
            fmt_count(c.totals.conversions)
        ));
    }
    out
}

fn recommendations(campaigns: &[CampaignSummary]) -> Vec<String> {
    if campaigns.is_empty() {
        return vec![
            "Increase data volume and tracking coverage to enable more granular optimization.".to_string(),
            "Test multiple creatives per campaign to identify winning variations.".to_string(),
        ];
    }

    let names = |list: Vec<&CampaignSummary>| -> String {
        list.iter()
            .take(2)
            .map(|c| c.campaign_id.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    };
    let top_cvr = names(ranked(campaigns, |c| c.ratios.cvr, true));
    let low_cpa = names(ranked(campaigns, |c| c.ratios.cpa, false));
    let high_cpa = names(ranked(campaigns, |c| c.ratios.cpa, true));

    let mut out = Vec::new();
    if !top_cvr.is_empty() && !low_cpa.is_empty() {
        out.push(format!(
            "Reallocate a portion of budget toward high-CVR campaigns ({top_cvr}) and low-CPA campaigns \
             ({low_cpa}) to scale efficient volume."
        ));
    }
    if !high_cpa.is_empty() {
        out.push(format!(
            "Audit creatives, audiences and landing pages for higher-CPA campaigns ({high_cpa}) to reduce cost."
        ));
    }
    out.push(
        "Run structured A/B tests on creatives and audience segments over the next one to two weeks before \
         scaling further."
            .to_string(),
    );
    out
}

/// Day-over-day impressions drops of at least `drop_threshold`.
///
/// Impressions are summed per scope and date; the scope is the row's
/// location, or the campaign when the row has none. Output is ordered by
/// scope, then date.
pub fn detect_anomalies(rows: &[MetricsRow], drop_threshold: f64) -> Result<Vec<Anomaly>, AppError> {
    #[derive(Default)]
    struct Day {
        impressions: u64,
        rainfall: Vec<f64>,
    }

    let mut by_scope: BTreeMap<String, BTreeMap<NaiveDate, Day>> = BTreeMap::new();
    for row in rows {
        let r = &row.record;
        let scope = match &r.location {
            Some(loc) => loc.clone(),
            None => format!("campaign {}", r.campaign_id),
        };
        let day = by_scope.entry(scope.clone()).or_default().entry(r.date).or_default();
        day.impressions = day.impressions.checked_add(r.impressions).ok_or_else(|| {
            AppError::computation(format!("Impressions for {scope} on {} overflow.", r.date))
        })?;
        day.rainfall
            .extend(r.weather.as_ref().and_then(|w| w.rainfall_mm));
    }

    let mut out = Vec::new();
    for (scope, days) in by_scope {
        let days: Vec<(NaiveDate, Day)> = days.into_iter().collect();
        for pair in days.windows(2) {
            let (prev_date, prev) = &pair[0];
            let (date, curr) = &pair[1];
            // Only consecutive calendar days are compared.
            if prev.impressions == 0 || date.signed_duration_since(*prev_date).num_days() != 1 {
                continue;
            }
            let change = (curr.impressions as f64 - prev.impressions as f64) / prev.impressions as f64;
            if change <= -drop_threshold {
                out.push(Anomaly {
                    scope: scope.clone(),
                    date: *date,
                    previous_impressions: prev.impressions,
                    impressions: curr.impressions,
                    drop: -change,
                    rainfall_mm: (!curr.rainfall.is_empty())
                        .then(|| curr.rainfall.iter().sum::<f64>() / curr.rainfall.len() as f64),
                });
            }
        }
    }
    Ok(out)
}

fn by_conversions_desc(campaigns: &[CampaignSummary]) -> Vec<&CampaignSummary> {
    let mut sorted: Vec<&CampaignSummary> = campaigns.iter().collect();
    sorted.sort_by(|a, b| {
        b.totals
            .conversions
            .cmp(&a.totals.conversions)
            .then_with(|| a.campaign_id.cmp(&b.campaign_id))
    });
    sorted
}

/// Campaigns with a defined value for `key`, best first; ties by id.
fn ranked(
    campaigns: &[CampaignSummary],
    key: impl Fn(&CampaignSummary) -> Option<f64>,
    descending: bool,
) -> Vec<&CampaignSummary> {
    let mut with_value: Vec<(f64, &CampaignSummary)> =
        campaigns.iter().filter_map(|c| key(c).map(|v| (v, c))).collect();
    with_value.sort_by(|(va, a), (vb, b)| {
        let ord = if descending { vb.total_cmp(va) } else { va.total_cmp(vb) };
        match ord {
            Ordering::Equal => a.campaign_id.cmp(&b.campaign_id),
            other => other,
        }
    });
    with_value.into_iter().map(|(_, c)| c).collect()
}
