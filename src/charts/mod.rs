//! Chart generation.
//!
//! Charts are produced from the aggregated `SummaryReport` only; they never see
//! raw rows. A run needs every kind in `ChartKind::REQUIRED`.

pub mod svg;

use std::collections::BTreeMap;
use std::fmt;

use crate::domain::SummaryReport;
use crate::error::AppError;

pub use svg::SvgCharts;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ChartKind {
    /// Top campaigns by spend, impressions vs clicks.
    CampaignVolume,
    /// Account impressions and clicks per day.
    DailyTrend,
}

impl ChartKind {
    pub const REQUIRED: [ChartKind; 2] = [ChartKind::CampaignVolume, ChartKind::DailyTrend];

    pub fn name(self) -> &'static str {
        match self {
            ChartKind::CampaignVolume => "campaign_volume",
            ChartKind::DailyTrend => "daily_trend",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            ChartKind::CampaignVolume => "Top campaigns by spend",
            ChartKind::DailyTrend => "Daily impressions and clicks",
        }
    }

    pub fn file_name(self) -> String {
        format!("{}.svg", self.name())
    }
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartArtifact {
    pub kind: ChartKind,
    pub svg: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChartSet {
    charts: BTreeMap<ChartKind, ChartArtifact>,
}

impl ChartSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, artifact: ChartArtifact) {
        self.charts.insert(artifact.kind, artifact);
    }

    pub fn get(&self, kind: ChartKind) -> Option<&ChartArtifact> {
        self.charts.get(&kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChartArtifact> {
        self.charts.values()
    }

    pub fn len(&self) -> usize {
        self.charts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.charts.is_empty()
    }

    /// Every required chart is present and non-empty.
    pub fn ensure_complete(&self) -> Result<(), AppError> {
        for kind in ChartKind::REQUIRED {
            match self.get(kind) {
                None => return Err(AppError::external(format!("Chart `{kind}` was not produced."))),
                Some(a) if a.svg.trim().is_empty() => {
                    return Err(AppError::external(format!("Chart `{kind}` is empty.")));
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

pub trait ChartRenderer {
    fn render(&self, report: &SummaryReport) -> Result<ChartSet, AppError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn artifact(kind: ChartKind, svg: &str) -> ChartArtifact {
        ChartArtifact {
            kind,
            svg: svg.to_string(),
        }
    }

    #[test]
    fn completeness_requires_every_kind() {
        let mut set = ChartSet::new();
        set.insert(artifact(ChartKind::CampaignVolume, "<svg/>"));
        let err = set.ensure_complete().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExternalService);
        assert!(err.message().contains("daily_trend"));

        set.insert(artifact(ChartKind::DailyTrend, "  "));
        assert!(set.ensure_complete().is_err());

        set.insert(artifact(ChartKind::DailyTrend, "<svg/>"));
        assert!(set.ensure_complete().is_ok());
        assert_eq!(set.len(), 2);
    }
}
