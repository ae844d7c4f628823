//! Run orchestration.
//!
//! `Orchestrator` owns one run:
//! Ingest -> Merge -> ComputeMetrics -> Aggregate -> Summarize -> Visualize -> Render
//!
//! Every stage takes the previous stage's output by reference and returns a
//! new value. The first error aborts the run; it keeps its kind and gains the
//! stage it surfaced in. Nothing is written to the output directory before the
//! Render stage, and Render itself is all-or-nothing.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use tracing::{error, info, info_span};

use crate::ai::{Narrative, Summarizer, SummaryRequest};
use crate::analytics::{compute_all, merge, summarize};
use crate::charts::{ChartRenderer, ChartSet};
use crate::config::RunConfig;
use crate::domain::{MergedRecordSet, MetricsRow, SourceTables, Stage, SummaryReport};
use crate::error::{AppError, ErrorKind};
use crate::io::ingest::{IngestReport, load_sources};
use crate::render::{DocumentRenderer, ReportBundle, ReportMeta, renderers_for, write_outputs};
use crate::report::{Highlights, build_highlights};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Pending,
    Running(Stage),
    Completed,
    Aborted { stage: Stage, kind: ErrorKind },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageRecord {
    pub stage: Stage,
    pub elapsed: Duration,
}

/// All computed outputs of a successful run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    /// Empty when the run started from pre-ingested tables.
    pub ingest: Vec<IngestReport>,
    pub merged: MergedRecordSet,
    pub rows: Vec<MetricsRow>,
    pub report: SummaryReport,
    pub narrative: Narrative,
    pub highlights: Highlights,
    pub charts: ChartSet,
    /// Committed output files.
    pub documents: Vec<PathBuf>,
}

pub struct Orchestrator {
    config: RunConfig,
    summarizer: Box<dyn Summarizer>,
    charts: Box<dyn ChartRenderer>,
    renderers: Vec<Box<dyn DocumentRenderer>>,
    state: RunState,
    history: Vec<StageRecord>,
}

impl Orchestrator {
    /// Document renderers follow `report.output_formats`.
    pub fn new(config: RunConfig, summarizer: Box<dyn Summarizer>, charts: Box<dyn ChartRenderer>) -> Self {
        let renderers = renderers_for(&config.report.output_formats);
        Self {
            config,
            summarizer,
            charts,
            renderers,
            state: RunState::Pending,
            history: Vec::new(),
        }
    }

    pub fn with_renderers(mut self, renderers: Vec<Box<dyn DocumentRenderer>>) -> Self {
        self.renderers = renderers;
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn history(&self) -> &[StageRecord] {
        &self.history
    }

    /// Run every stage, ingesting from the configured paths.
    pub fn run(&mut self) -> Result<RunOutput, AppError> {
        self.begin()?;
        let ingested = self.stage(Stage::Ingest, |o| load_sources(&o.config.data_sources))?;
        self.execute(ingested.tables, ingested.reports)
    }

    /// Run from Merge onwards with tables that are already ingested.
    pub fn run_with_sources(&mut self, tables: SourceTables) -> Result<RunOutput, AppError> {
        self.begin()?;
        self.execute(tables, Vec::new())
    }

    fn begin(&mut self) -> Result<(), AppError> {
        if self.state != RunState::Pending {
            return Err(AppError::config("This orchestrator has already run; create a new one."));
        }
        info!(
            client = %self.config.report.client_name,
            week_start = %self.config.report.week_start,
            week_end = %self.config.report.week_end,
            "starting run"
        );
        Ok(())
    }

    fn execute(&mut self, tables: SourceTables, ingest: Vec<IngestReport>) -> Result<RunOutput, AppError> {
        let merged = self.stage(Stage::Merge, |o| {
            merge(&tables.traffic, &tables.clicks, tables.weather.as_ref(), &o.config.merge)
        })?;

        let rows = self.stage(Stage::ComputeMetrics, |_| compute_all(&merged))?;

        let (report, highlights) = self.stage(Stage::Aggregate, |o| {
            let report = summarize(&rows)?;
            let highlights = build_highlights(&report, &rows, o.config.report.anomaly_drop_threshold)?;
            Ok((report, highlights))
        })?;

        let narrative = self.stage(Stage::Summarize, |o| {
            let request = SummaryRequest::new(
                &o.config.report.client_name,
                o.config.report.week_start,
                o.config.report.week_end,
                &report,
            );
            let narrative = o.summarizer.summarize(&request)?;
            if narrative.is_blank() {
                return Err(AppError::external("The summarizer returned an empty narrative."));
            }
            Ok(narrative)
        })?;

        let charts = self.stage(Stage::Visualize, |o| {
            let charts = o.charts.render(&report)?;
            charts.ensure_complete()?;
            Ok(charts)
        })?;

        let documents = self.stage(Stage::Render, |o| {
            let meta = ReportMeta::from_config(&o.config);
            let bundle = ReportBundle {
                meta: &meta,
                report: &report,
                narrative: &narrative,
                highlights: &highlights,
                charts: &charts,
            };
            let dataset = o.config.report.export_dataset.then_some(rows.as_slice());
            write_outputs(&o.config.report.output_dir, &bundle, &o.renderers, dataset)
        })?;

        self.state = RunState::Completed;
        info!(
            campaigns = report.account.campaign_count,
            documents = documents.len(),
            "run completed"
        );

        Ok(RunOutput {
            ingest,
            merged,
            rows,
            report,
            narrative,
            highlights,
            charts,
            documents,
        })
    }

    fn stage<T>(&mut self, stage: Stage, f: impl FnOnce(&Self) -> Result<T, AppError>) -> Result<T, AppError> {
        self.state = RunState::Running(stage);
        let span = info_span!("stage", stage = %stage);
        let _enter = span.enter();
        let started = Instant::now();

        match f(self) {
            Ok(value) => {
                let elapsed = started.elapsed();
                self.history.push(StageRecord { stage, elapsed });
                info!(elapsed_ms = elapsed.as_millis() as u64, "stage complete");
                Ok(value)
            }
            Err(e) => {
                let e = e.at_stage(stage);
                error!(kind = e.kind().label(), "run aborted: {}", e.message());
                self.state = RunState::Aborted { stage, kind: e.kind() };
                Err(e)
            }
        }
    }
}
