//! Self-contained HTML report (print-ready; charts are inlined as SVG).

use std::fmt::Write as _;

use crate::charts::ChartKind;
use crate::error::AppError;
use crate::render::{DocumentRenderer, ReportBundle};
use crate::report::format::{fmt_count, fmt_money, fmt_money_opt, fmt_pct};

const STYLE: &str = "\
body{font-family:Helvetica,Arial,sans-serif;max-width:960px;margin:2em auto;color:#222;line-height:1.45}\
h1{color:#1F4E79}h2{color:#1F4E79;border-bottom:1px solid #ccc;padding-bottom:.2em}\
table{border-collapse:collapse;margin:1em 0}th{background:#1F4E79;color:#fff}\
th,td{border:1px solid #bbb;padding:4px 8px}td.num{text-align:right}\
figure{margin:1em 0}.subtitle{color:#555}@media print{h2{page-break-before:always}}";

#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlRenderer;

impl DocumentRenderer for HtmlRenderer {
    fn file_name(&self, base_name: &str) -> String {
        format!("{base_name}.html")
    }

    fn render(&self, bundle: &ReportBundle<'_>) -> Result<Vec<u8>, AppError> {
        let mut out = String::new();
        write_document(&mut out, bundle).map_err(|e| AppError::external(format!("HTML rendering failed: {e}")))?;
        Ok(out.into_bytes())
    }
}

fn write_document(out: &mut String, b: &ReportBundle<'_>) -> std::fmt::Result {
    let title = escape(&b.meta.title());
    writeln!(out, "<!DOCTYPE html>")?;
    writeln!(out, "<html lang=\"en\"><head><meta charset=\"utf-8\"><title>{title}</title>")?;
    writeln!(out, "<style>{STYLE}</style></head><body>")?;
    writeln!(out, "<h1>{title}</h1>")?;
    writeln!(
        out,
        "<p class=\"subtitle\">Reporting period: {}</p>",
        escape(&b.meta.period())
    )?;

    writeln!(out, "<h2>Executive Summary</h2>")?;
    for p in b.narrative.paragraphs() {
        writeln!(out, "<p>{}</p>", escape(p))?;
    }
    list(out, "Top Wins", &b.highlights.top_wins)?;
    list(out, "Key Concerns", &b.highlights.concerns)?;

    writeln!(out, "<h2>Key Highlights &amp; KPIs</h2>")?;
    write_list_items(out, &b.highlights.key_highlights)?;
    let a = &b.report.account;
    writeln!(out, "<table><tr><th>Metric</th><th>Value</th></tr>")?;
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
        writeln!(out, "<tr><td>{label}</td><td class=\"num\">{value}</td></tr>")?;
    }
    writeln!(out, "</table>")?;

    writeln!(out, "<h2>Charts</h2>")?;
    for kind in ChartKind::REQUIRED {
        if let Some(chart) = b.charts.get(kind) {
            writeln!(
                out,
                "<figure>{}<figcaption>{}</figcaption></figure>",
                strip_xml_declaration(&chart.svg),
                escape(kind.title())
            )?;
        }
    }

    writeln!(out, "<h2>Campaign Performance</h2>")?;
    writeln!(
        out,
        "<table><tr><th>Campaign</th><th>Impressions</th><th>Clicks</th><th>Conversions</th>\
         <th>Spend</th><th>CTR</th><th>CPC</th><th>CPA</th><th>CVR</th><th>Share of spend</th></tr>"
    )?;
    for c in &b.report.campaigns {
        writeln!(
            out,
            "<tr><td>{}</td><td class=\"num\">{}</td><td class=\"num\">{}</td><td class=\"num\">{}</td>\
             <td class=\"num\">{}</td><td class=\"num\">{}</td><td class=\"num\">{}</td>\
             <td class=\"num\">{}</td><td class=\"num\">{}</td><td class=\"num\">{}</td></tr>",
            escape(&c.campaign_id),
            fmt_count(c.totals.impressions),
            fmt_count(c.totals.clicks),
            fmt_count(c.totals.conversions),
            fmt_money(c.totals.spend),
            fmt_pct(c.ratios.ctr),
            fmt_money_opt(c.ratios.cpc),
            fmt_money_opt(c.ratios.cpa),
            fmt_pct(c.ratios.cvr),
            fmt_pct(c.spend_ratio),
        )?;
    }
    writeln!(out, "</table>")?;

    let anomalies: Vec<String> = b.highlights.anomalies.iter().map(|a| a.describe()).collect();
    list(out, "Anomaly Analysis", &anomalies)?;
    list(out, "Recommendations", &b.highlights.recommendations)?;

    writeln!(out, "</body></html>")
}

fn list(out: &mut String, heading: &str, items: &[String]) -> std::fmt::Result {
    if items.is_empty() {
        return Ok(());
    }
    writeln!(out, "<h2>{}</h2>", escape(heading))?;
    write_list_items(out, items)
}

fn write_list_items(out: &mut String, items: &[String]) -> std::fmt::Result {
    writeln!(out, "<ul>")?;
    for item in items {
        writeln!(out, "<li>{}</li>", escape(item))?;
    }
    writeln!(out, "</ul>")
}

fn strip_xml_declaration(svg: &str) -> &str {
    let s = svg.trim_start();
    if s.starts_with("<?xml") {
        if let Some(end) = s.find("?>") {
            return s[end + 2..].trim_start();
        }
    }
    s
}

pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::Narrative;
    use crate::charts::{ChartArtifact, ChartSet};
    use crate::domain::{CampaignSummary, Ratios, SummaryReport, Totals};
    use crate::render::ReportMeta;
    use crate::report::Highlights;
    use chrono::NaiveDate;

    #[test]
    fn renders_sections_and_escapes_text() {
        let d = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let meta = ReportMeta {
            client_name: "Fish & <Chips>".to_string(),
            week_start: d,
            week_end: d,
            base_name: "x".to_string(),
        };
        let report = SummaryReport {
            campaigns: vec![CampaignSummary {
                campaign_id: "dark".to_string(),
                first_date: d,
                last_date: d,
                days: 1,
                totals: Totals::default(),
                ratios: Ratios::default(),
                spend_ratio: None,
            }],
            ..SummaryReport::default()
        };
        let mut charts = ChartSet::new();
        charts.insert(ChartArtifact {
            kind: ChartKind::DailyTrend,
            svg: "<?xml version=\"1.0\"?>\n<svg id=\"trend\"></svg>".to_string(),
        });
        let highlights = Highlights {
            recommendations: vec!["Spend < 10".to_string()],
            ..Highlights::default()
        };
        let narrative = Narrative::new("Week one.\n\nWeek two.");

        let html = HtmlRenderer
            .render(&ReportBundle {
                meta: &meta,
                report: &report,
                narrative: &narrative,
                highlights: &highlights,
                charts: &charts,
            })
            .unwrap();
        let html = String::from_utf8(html).unwrap();

        assert!(html.contains("<h1>Fish &amp; &lt;Chips&gt; - Weekly Performance Report</h1>"));
        assert!(html.contains("<p>Week one.</p>\n<p>Week two.</p>"));
        assert!(html.contains("<figure><svg id=\"trend\"></svg>"));
        assert!(html.contains("<li>Spend &lt; 10</li>"));
        assert!(html.contains("<td>dark</td>"));
        assert!(html.contains("n/a"));
        assert!(!html.contains("Top Wins"));
        assert_eq!(HtmlRenderer.file_name("base"), "base.html");
    }
}
