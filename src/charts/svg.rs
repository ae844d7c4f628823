//! Plotters SVG charts.
//!
//! Drawing is pure data-in, string-out: series are prepared from the report
//! before any plotters call, and the SVG is rendered into memory. Writing the
//! files is left to the render stage.

use plotters::coord::Shift;
use plotters::prelude::*;

use crate::charts::{ChartArtifact, ChartKind, ChartRenderer, ChartSet};
use crate::domain::{CampaignSummary, DailyTotals, SummaryReport};
use crate::error::AppError;

/// Campaigns shown in the volume chart.
pub const TOP_CAMPAIGNS: usize = 5;

const IMPRESSIONS: RGBColor = RGBColor(66, 133, 244);
const CLICKS: RGBColor = RGBColor(234, 67, 53);

#[derive(Debug, Clone, Copy)]
pub struct SvgCharts {
    pub width: u32,
    pub height: u32,
}

impl Default for SvgCharts {
    fn default() -> Self {
        Self {
            width: 800,
            height: 450,
        }
    }
}

impl ChartRenderer for SvgCharts {
    fn render(&self, report: &SummaryReport) -> Result<ChartSet, AppError> {
        let mut set = ChartSet::new();
        set.insert(ChartArtifact {
            kind: ChartKind::CampaignVolume,
            svg: self.draw(|root| campaign_volume(root, &top_by_spend(&report.campaigns, TOP_CAMPAIGNS)))?,
        });
        set.insert(ChartArtifact {
            kind: ChartKind::DailyTrend,
            svg: self.draw(|root| daily_trend(root, &report.daily))?,
        });
        Ok(set)
    }
}

impl SvgCharts {
    fn draw<F>(&self, paint: F) -> Result<String, AppError>
    where
        F: FnOnce(&DrawingArea<SVGBackend<'_>, Shift>) -> Result<(), AppError>,
    {
        let mut svg = String::new();
        {
            let root = SVGBackend::with_string(&mut svg, (self.width, self.height)).into_drawing_area();
            root.fill(&WHITE).map_err(draw_error)?;
            paint(&root)?;
            root.present().map_err(draw_error)?;
        }
        Ok(svg)
    }
}

/// Highest spend first; ties broken by `campaign_id`.
pub fn top_by_spend(campaigns: &[CampaignSummary], n: usize) -> Vec<&CampaignSummary> {
    let mut sorted: Vec<&CampaignSummary> = campaigns.iter().collect();
    sorted.sort_by(|a, b| {
        b.totals
            .spend
            .total_cmp(&a.totals.spend)
            .then_with(|| a.campaign_id.cmp(&b.campaign_id))
    });
    sorted.truncate(n);
    sorted
}

fn campaign_volume(root: &DrawingArea<SVGBackend<'_>, Shift>, top: &[&CampaignSummary]) -> Result<(), AppError> {
    let n = top.len().max(1) as f64;
    let y_max = top
        .iter()
        .map(|c| c.totals.impressions.max(c.totals.clicks))
        .max()
        .unwrap_or(0)
        .max(1) as f64
        * 1.1;
    let labels: Vec<&str> = top.iter().map(|c| c.campaign_id.as_str()).collect();

    let mut chart = ChartBuilder::on(root)
        .caption(ChartKind::CampaignVolume.title(), ("sans-serif", 20))
        .margin(10)
        .set_label_area_size(LabelAreaPosition::Left, 70)
        .set_label_area_size(LabelAreaPosition::Bottom, 40)
        .build_cartesian_2d(-0.5..n - 0.5, 0.0..y_max)
        .map_err(draw_error)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(labels.len().max(1))
        .x_label_formatter(&|v| label_at(&labels, *v))
        .y_label_formatter(&|v| compact(*v))
        .y_desc("Count")
        .draw()
        .map_err(draw_error)?;

    chart
        .draw_series(top.iter().enumerate().map(|(i, c)| {
            let x = i as f64;
            Rectangle::new([(x - 0.35, 0.0), (x, c.totals.impressions as f64)], IMPRESSIONS.filled())
        }))
        .map_err(draw_error)?
        .label("Impressions")
        .legend(|(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], IMPRESSIONS.filled()));

    chart
        .draw_series(top.iter().enumerate().map(|(i, c)| {
            let x = i as f64;
            Rectangle::new([(x, 0.0), (x + 0.35, c.totals.clicks as f64)], CLICKS.filled())
        }))
        .map_err(draw_error)?
        .label("Clicks")
        .legend(|(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], CLICKS.filled()));

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()
        .map_err(draw_error)?;
    Ok(())
}

fn daily_trend(root: &DrawingArea<SVGBackend<'_>, Shift>, daily: &[DailyTotals]) -> Result<(), AppError> {
    let last = daily.len().saturating_sub(1) as f64;
    let (x0, x1) = if last > 0.0 { (0.0, last) } else { (-0.5, 0.5) };
    let y_max = daily
        .iter()
        .map(|d| d.totals.impressions.max(d.totals.clicks))
        .max()
        .unwrap_or(0)
        .max(1) as f64
        * 1.1;
    let labels: Vec<String> = daily.iter().map(|d| d.date.format("%m-%d").to_string()).collect();
    let label_refs: Vec<&str> = labels.iter().map(String::as_str).collect();

    let mut chart = ChartBuilder::on(root)
        .caption(ChartKind::DailyTrend.title(), ("sans-serif", 20))
        .margin(10)
        .set_label_area_size(LabelAreaPosition::Left, 70)
        .set_label_area_size(LabelAreaPosition::Bottom, 40)
        .build_cartesian_2d(x0..x1, 0.0..y_max)
        .map_err(draw_error)?;

    chart
        .configure_mesh()
        .x_labels(labels.len().clamp(1, 10))
        .x_label_formatter(&|v| label_at(&label_refs, *v))
        .y_label_formatter(&|v| compact(*v))
        .x_desc("Date")
        .draw()
        .map_err(draw_error)?;

    chart
        .draw_series(LineSeries::new(
            daily.iter().enumerate().map(|(i, d)| (i as f64, d.totals.impressions as f64)),
            &IMPRESSIONS,
        ))
        .map_err(draw_error)?
        .label("Impressions")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 16, y)], IMPRESSIONS));

    chart
        .draw_series(LineSeries::new(
            daily.iter().enumerate().map(|(i, d)| (i as f64, d.totals.clicks as f64)),
            &CLICKS,
        ))
        .map_err(draw_error)?
        .label("Clicks")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 16, y)], CLICKS));

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()
        .map_err(draw_error)?;
    Ok(())
}

/// Category label for an integer tick; blank between categories.
fn label_at(labels: &[&str], v: f64) -> String {
    let i = v.round();
    if (v - i).abs() > 1e-6 || i < 0.0 {
        return String::new();
    }
    labels.get(i as usize).map(|s| s.to_string()).unwrap_or_default()
}

fn compact(v: f64) -> String {
    let a = v.abs();
    if a >= 1e6 {
        format!("{:.1}M", v / 1e6)
    } else if a >= 1e3 {
        format!("{:.1}k", v / 1e3)
    } else {
        format!("{v:.0}")
    }
}

fn draw_error<E: std::error::Error + Send + Sync>(e: DrawingAreaErrorKind<E>) -> AppError {
    AppError::external(format!("Chart rendering failed: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AccountSummary, Ratios, Totals};
    use chrono::NaiveDate;

    fn campaign(id: &str, impressions: u64, clicks: u64, spend: f64) -> CampaignSummary {
        let d = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        CampaignSummary {
            campaign_id: id.to_string(),
            first_date: d,
            last_date: d,
            days: 1,
            totals: Totals {
                impressions,
                clicks,
                spend,
                conversions: 0,
            },
            ratios: Ratios::default(),
            spend_ratio: None,
        }
    }

    fn report() -> SummaryReport {
        let daily = (1..=3)
            .map(|d| DailyTotals {
                date: NaiveDate::from_ymd_opt(2024, 1, d).unwrap(),
                totals: Totals {
                    impressions: 1000 * u64::from(d),
                    clicks: 10 * u64::from(d),
                    spend: 1.0,
                    conversions: 0,
                },
                ratios: Ratios::default(),
            })
            .collect();
        SummaryReport {
            campaigns: (0..7)
                .map(|i| campaign(&format!("C{i}"), 1000 + i, 10 + i, f64::from(i as u32)))
                .collect(),
            account: AccountSummary::default(),
            daily,
        }
    }

    #[test]
    fn top_by_spend_orders_and_truncates() {
        let campaigns = vec![campaign("b", 1, 0, 5.0), campaign("a", 1, 0, 5.0), campaign("c", 1, 0, 9.0)];
        let ids: Vec<&str> = top_by_spend(&campaigns, 2).iter().map(|c| c.campaign_id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a"]);
    }

    #[test]
    fn renders_every_required_chart() {
        let set = SvgCharts::default().render(&report()).unwrap();
        set.ensure_complete().unwrap();
        let volume = &set.get(ChartKind::CampaignVolume).unwrap().svg;
        assert!(volume.starts_with("<svg"));
        assert!(volume.contains("C6"), "highest spend campaign is labelled");
        assert_eq!(top_by_spend(&report().campaigns, TOP_CAMPAIGNS).len(), TOP_CAMPAIGNS);
    }

    #[test]
    fn empty_report_still_renders() {
        let set = SvgCharts::default().render(&SummaryReport::default()).unwrap();
        assert!(set.ensure_complete().is_ok());
    }

    #[test]
    fn label_at_only_labels_integer_ticks() {
        let labels = ["a", "b"];
        assert_eq!(label_at(&labels, 1.0), "b");
        assert_eq!(label_at(&labels, 0.5), "");
        assert_eq!(label_at(&labels, 2.0), "");
        assert_eq!(compact(12_500.0), "12.5k");
    }
}
