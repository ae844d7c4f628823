//! Display precision and terminal tables.
//!
//! Analytics values are stored at full precision; this is the only place they
//! are rounded. Undefined ratios print as `n/a`, never as zero.

use crate::config::RunConfig;
use crate::domain::{MergedRecordSet, Ratios, SummaryReport, Totals};
use crate::io::ingest::IngestReport;

pub const UNDEFINED: &str = "n/a";

/// Ratio as a percentage with two decimals.
pub fn fmt_pct(v: Option<f64>) -> String {
    v.map(|x| format!("{:.2}%", x * 100.0)).unwrap_or_else(|| UNDEFINED.to_string())
}

/// Currency-style amount: thousands separators, two decimals.
pub fn fmt_money(v: f64) -> String {
    let fixed = format!("{:.2}", v.abs());
    let (int_part, frac) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    let sign = if v < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("{sign}{}.{frac}", group_thousands(int_part))
}

pub fn fmt_money_opt(v: Option<f64>) -> String {
    v.map(fmt_money).unwrap_or_else(|| UNDEFINED.to_string())
}

pub fn fmt_count(v: u64) -> String {
    group_thousands(&v.to_string())
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Run header: client, period and what went into the dataset.
pub fn format_run_summary(
    config: &RunConfig,
    ingest: &[IngestReport],
    merged: &MergedRecordSet,
    report: &SummaryReport,
) -> String {
    let mut out = String::new();

    out.push_str("=== insight - Weekly Campaign Report ===\n");
    out.push_str(&format!("Client: {}\n", config.report.client_name));
    out.push_str(&format!(
        "Period: {} to {}\n",
        config.report.week_start, config.report.week_end
    ));

    for r in ingest {
        out.push_str(&format!(
            "Source {:<8} rows={} used={} rejected={} records={}\n",
            r.source.display_name(),
            r.rows_read,
            r.rows_used,
            r.row_errors.len(),
            r.records
        ));
    }

    let span = match (report.account.first_date, report.account.last_date) {
        (Some(a), Some(b)) => format!("{a} to {b}"),
        _ => "-".to_string(),
    };
    out.push_str(&format!(
        "Merged: rows={} | campaigns={} | dates={span}\n",
        merged.len(),
        report.account.campaign_count
    ));
    out.push('\n');

    out
}

/// Per-campaign table with an account total line.
pub fn format_campaign_table(report: &SummaryReport) -> String {
    let mut out = String::new();
    out.push_str(
        format!(
            "{:<20} {:>12} {:>9} {:>12} {:>6} {:>8} {:>9} {:>9} {:>8} {:>7}\n",
            "campaign", "impressions", "clicks", "spend", "conv", "ctr", "cpc", "cpa", "cvr", "share"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(
        format!(
            "{:-<20} {:-<12} {:-<9} {:-<12} {:-<6} {:-<8} {:-<9} {:-<9} {:-<8} {:-<7}\n",
            "", "", "", "", "", "", "", "", "", ""
        )
        .trim_end(),
    );
    out.push('\n');

    for c in &report.campaigns {
        out.push_str(&table_row(
            &truncate(&c.campaign_id, 20),
            &c.totals,
            &c.ratios,
            &fmt_pct(c.spend_ratio),
        ));
    }

    let a = &report.account;
    out.push_str(&table_row("TOTAL", &a.totals, &a.ratios, ""));
    out
}

fn table_row(label: &str, totals: &Totals, ratios: &Ratios, share: &str) -> String {
    let mut line = format!(
        "{:<20} {:>12} {:>9} {:>12} {:>6} {:>8} {:>9} {:>9} {:>8} {:>7}",
        label,
        fmt_count(totals.impressions),
        fmt_count(totals.clicks),
        fmt_money(totals.spend),
        fmt_count(totals.conversions),
        fmt_pct(ratios.ctr),
        fmt_money_opt(ratios.cpc),
        fmt_money_opt(ratios.cpa),
        fmt_pct(ratios.cvr),
        share,
    )
    .trim_end()
    .to_string();
    line.push('\n');
    line
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('.');
    out
}
