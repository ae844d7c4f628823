//! Markdown slide deck: one slide per section, separated by `---`.
//! Charts are linked from the `charts/` directory written alongside.

use std::fmt::Write as _;

use crate::charts::ChartKind;
use crate::error::AppError;
use crate::render::{CHARTS_DIR, DocumentRenderer, ReportBundle};
use crate::report::format::{fmt_count, fmt_money, fmt_money_opt, fmt_pct};

/// Campaign rows on the table slide.
const TABLE_ROWS: usize = 10;

#[derive(Debug, Clone, Copy, Default)]
pub struct SlidesRenderer;

impl DocumentRenderer for SlidesRenderer {
    fn file_name(&self, base_name: &str) -> String {
        format!("{base_name}.slides.md")
    }

    fn render(&self, bundle: &ReportBundle<'_>) -> Result<Vec<u8>, AppError> {
        let mut out = String::new();
        write_deck(&mut out, bundle).map_err(|e| AppError::external(format!("Slide rendering failed: {e}")))?;
        Ok(out.into_bytes())
    }
}

fn write_deck(out: &mut String, b: &ReportBundle<'_>) -> std::fmt::Result {
    writeln!(out, "# {}\n", b.meta.title())?;
    writeln!(out, "Reporting period: {}\n", b.meta.period())?;

    slide(out, "Executive Summary")?;
    for p in b.narrative.paragraphs() {
        writeln!(out, "{p}\n")?;
    }

    bullets(out, "Key Highlights", &b.highlights.key_highlights)?;

    let a = &b.report.account;
    slide(out, "KPI Dashboard")?;
    writeln!(out, "| Metric | Value |\n|---|---:|")?;
    for (label, value) in [
        ("Impressions", fmt_count(a.totals.impressions)),
        ("Clicks", fmt_count(a.totals.clicks)),
        ("Conversions", fmt_count(a.totals.conversions)),
        ("Spend", fmt_money(a.totals.spend)),
        ("CTR", fmt_pct(a.ratios.ctr)),
        ("CPC", fmt_money_opt(a.ratios.cpc)),
        ("CVR", fmt_pct(a.ratios.cvr)),
        ("CPA", fmt_money_opt(a.ratios.cpa)),
    ] {
        writeln!(out, "| {label} | {value} |")?;
    }
    writeln!(out)?;

    slide(out, "Top Campaigns (by Spend)")?;
    writeln!(out, "| Campaign | Spend | Conversions | CTR | CPA |\n|---|---:|---:|---:|---:|")?;
    let mut by_spend: Vec<_> = b.report.campaigns.iter().collect();
    by_spend.sort_by(|x, y| {
        y.totals
            .spend
            .total_cmp(&x.totals.spend)
            .then_with(|| x.campaign_id.cmp(&y.campaign_id))
    });
    for c in by_spend.into_iter().take(TABLE_ROWS) {
        writeln!(
            out,
            "| {} | {} | {} | {} | {} |",
            c.campaign_id.replace('|', "\\|"),
            fmt_money(c.totals.spend),
            fmt_count(c.totals.conversions),
            fmt_pct(c.ratios.ctr),
            fmt_money_opt(c.ratios.cpa)
        )?;
    }
    writeln!(out)?;

    for kind in ChartKind::REQUIRED {
        if b.charts.get(kind).is_some() {
            slide(out, kind.title())?;
            writeln!(out, "![{}]({CHARTS_DIR}/{})\n", kind.title(), kind.file_name())?;
        }
    }

    let anomalies: Vec<String> = b.highlights.anomalies.iter().map(|a| a.describe()).collect();
    bullets(out, "Anomaly Analysis", &anomalies)?;
    bullets(out, "Optimization Plan", &b.highlights.recommendations)?;

    slide(out, "Glossary")?;
    for line in [
        "CTR: clicks divided by impressions.",
        "CPC: spend divided by clicks.",
        "CPA: spend divided by conversions.",
        "CVR: conversions divided by clicks.",
        "n/a: undefined because the denominator was zero.",
    ] {
        writeln!(out, "- {line}")?;
    }
    Ok(())
}

fn slide(out: &mut String, title: &str) -> std::fmt::Result {
    writeln!(out, "---\n\n## {title}\n")
}

fn bullets(out: &mut String, title: &str, items: &[String]) -> std::fmt::Result {
    if items.is_empty() {
        return Ok(());
    }
    slide(out, title)?;
    for item in items {
        writeln!(out, "- {item}")?;
    }
    writeln!(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::Narrative;
    use crate::charts::{ChartArtifact, ChartSet};
    use crate::domain::SummaryReport;
    use crate::render::ReportMeta;
    use crate::report::Highlights;
    use chrono::NaiveDate;

    #[test]
    fn deck_has_one_slide_per_section_and_links_charts() {
        let d = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let meta = ReportMeta {
            client_name: "Acme".to_string(),
            week_start: d,
            week_end: d,
            base_name: "Acme".to_string(),
        };
        let mut charts = ChartSet::new();
        for kind in ChartKind::REQUIRED {
            charts.insert(ChartArtifact {
                kind,
                svg: "<svg/>".to_string(),
            });
        }
        let highlights = Highlights {
            key_highlights: vec!["Good week.".to_string()],
            ..Highlights::default()
        };

        let deck = SlidesRenderer
            .render(&ReportBundle {
                meta: &meta,
                report: &SummaryReport::default(),
                narrative: &Narrative::new("Summary text."),
                highlights: &highlights,
                charts: &charts,
            })
            .unwrap();
        let deck = String::from_utf8(deck).unwrap();

        assert!(deck.starts_with("# Acme - Weekly Performance Report"));
        assert!(deck.contains("![Daily impressions and clicks](charts/daily_trend.svg)"));
        assert!(deck.contains("- Good week."));
        assert!(!deck.contains("Anomaly Analysis"));
        // summary, highlights, KPIs, table, two charts, glossary
        assert_eq!(deck.matches("\n---\n").count(), 7);
    }
}
