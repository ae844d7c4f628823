//! Client document rendering and all-or-nothing output.
//!
//! Renderers turn a `ReportBundle` into bytes and never touch the filesystem.
//! `write_outputs` renders every document first, writes everything (charts,
//! documents, optional exports) into a staging directory inside the output
//! directory, and only then moves the files into place. Any failure leaves the
//! output directory as it was.

pub mod html;
pub mod slides;

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tempfile::TempDir;
use tracing::{info, warn};

use crate::ai::Narrative;
use crate::charts::ChartSet;
use crate::config::{OutputFormat, RunConfig};
use crate::domain::{MetricsRow, SummaryReport};
use crate::error::AppError;
use crate::io::export::{DATASET_FILE, SUMMARY_FILE, write_dataset_csv, write_summary_json};
use crate::report::Highlights;

pub use html::HtmlRenderer;
pub use slides::SlidesRenderer;

/// Chart files live under this directory next to the documents.
pub const CHARTS_DIR: &str = "charts";

#[derive(Debug, Clone, PartialEq)]
pub struct ReportMeta {
    pub client_name: String,
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    /// File stem shared by every document of the run.
    pub base_name: String,
}

impl ReportMeta {
    pub fn from_config(config: &RunConfig) -> Self {
        Self {
            client_name: config.report.client_name.clone(),
            week_start: config.report.week_start,
            week_end: config.report.week_end,
            base_name: config.base_file_name(),
        }
    }

    pub fn title(&self) -> String {
        format!("{} - Weekly Performance Report", self.client_name)
    }

    pub fn period(&self) -> String {
        format!("{} to {}", self.week_start, self.week_end)
    }
}

/// Everything a document needs, borrowed from the run.
#[derive(Debug, Clone, Copy)]
pub struct ReportBundle<'a> {
    pub meta: &'a ReportMeta,
    pub report: &'a SummaryReport,
    pub narrative: &'a Narrative,
    pub highlights: &'a Highlights,
    pub charts: &'a ChartSet,
}

pub trait DocumentRenderer {
    /// Document file name for a run's base name.
    fn file_name(&self, base_name: &str) -> String;

    fn render(&self, bundle: &ReportBundle<'_>) -> Result<Vec<u8>, AppError>;
}

/// Renderers for the configured formats, in config order.
pub fn renderers_for(formats: &[OutputFormat]) -> Vec<Box<dyn DocumentRenderer>> {
    formats
        .iter()
        .map(|f| -> Box<dyn DocumentRenderer> {
            match f {
                OutputFormat::Html => Box::new(HtmlRenderer),
                OutputFormat::Slides => Box::new(SlidesRenderer),
            }
        })
        .collect()
}

/// Render and write every output of a run, or nothing.
///
/// Returns the committed paths: documents first, then charts and exports.
pub fn write_outputs(
    output_dir: &Path,
    bundle: &ReportBundle<'_>,
    renderers: &[Box<dyn DocumentRenderer>],
    dataset: Option<&[MetricsRow]>,
) -> Result<Vec<PathBuf>, AppError> {
    let mut documents = Vec::with_capacity(renderers.len());
    for renderer in renderers {
        let name = renderer.file_name(&bundle.meta.base_name);
        let bytes = renderer.render(bundle)?;
        if bytes.is_empty() {
            return Err(AppError::external(format!("Renderer produced an empty document: {name}")));
        }
        documents.push((name, bytes));
    }

    let mut staging = Staging::new(output_dir)?;
    for (name, bytes) in &documents {
        staging.write(Path::new(name), bytes)?;
    }
    for chart in bundle.charts.iter() {
        staging.write(&Path::new(CHARTS_DIR).join(chart.kind.file_name()), chart.svg.as_bytes())?;
    }
    if let Some(rows) = dataset {
        let mut csv = Vec::new();
        write_dataset_csv(&mut csv, rows)?;
        staging.write(Path::new(DATASET_FILE), &csv)?;

        let mut json = Vec::new();
        write_summary_json(&mut json, bundle.report)?;
        staging.write(Path::new(SUMMARY_FILE), &json)?;
    }

    let committed = staging.commit()?;
    info!(files = committed.len(), dir = %output_dir.display(), "wrote report outputs");
    Ok(committed)
}

/// A hidden temporary directory inside the output directory.
///
/// Dropping an uncommitted `Staging` deletes it with everything written so far.
pub struct Staging {
    dir: TempDir,
    output_dir: PathBuf,
    files: Vec<PathBuf>,
}

impl Staging {
    pub fn new(output_dir: &Path) -> Result<Self, AppError> {
        fs::create_dir_all(output_dir).map_err(|e| {
            AppError::io(format!("Failed to create output dir '{}': {e}", output_dir.display()))
        })?;
        let dir = tempfile::Builder::new()
            .prefix(".staging-")
            .tempdir_in(output_dir)
            .map_err(|e| AppError::io(format!("Failed to create staging dir: {e}")))?;
        Ok(Self {
            dir,
            output_dir: output_dir.to_path_buf(),
            files: Vec::new(),
        })
    }

    /// Write `bytes` at `relative` inside the staging directory.
    pub fn write(&mut self, relative: &Path, bytes: &[u8]) -> Result<(), AppError> {
        let path = self.dir.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| AppError::io(format!("Failed to create '{}': {e}", parent.display())))?;
        }
        fs::write(&path, bytes).map_err(|e| AppError::io(format!("Failed to write '{}': {e}", path.display())))?;
        self.files.push(relative.to_path_buf());
        Ok(())
    }

    /// Move every staged file into the output directory.
    ///
    /// A file already at a target is moved aside first. On failure, files
    /// already moved are removed again, the files they replaced are restored,
    /// directories this commit created are removed and the staging directory
    /// is deleted.
    pub fn commit(self) -> Result<Vec<PathBuf>, AppError> {
        let mut log = CommitLog::default();

        for relative in &self.files {
            let target = self.output_dir.join(relative);
            if let Err(e) = self.place(relative, &target, &mut log) {
                log.rollback();
                return Err(AppError::io(format!(
                    "Failed to move '{}' into place: {e}",
                    target.display()
                )));
            }
        }

        Ok(log.moved)
    }

    fn place(&self, relative: &Path, target: &Path, log: &mut CommitLog) -> std::io::Result<()> {
        ensure_parent(target, &mut log.created_dirs)?;
        if target.is_file() {
            let backup = self.dir.path().join(PREVIOUS_DIR).join(relative);
            if let Some(parent) = backup.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::rename(target, &backup)?;
            log.replaced.push((target.to_path_buf(), backup));
        }
        fs::rename(self.dir.path().join(relative), target)?;
        log.moved.push(target.to_path_buf());
        Ok(())
    }
}

/// Replaced files wait here until the commit either succeeds or rolls back.
const PREVIOUS_DIR: &str = ".previous";

#[derive(Debug, Default)]
struct CommitLog {
    moved: Vec<PathBuf>,
    /// (target, backup inside the staging directory)
    replaced: Vec<(PathBuf, PathBuf)>,
    created_dirs: Vec<PathBuf>,
}

impl CommitLog {
    fn rollback(&self) {
        for path in &self.moved {
            if let Err(e) = fs::remove_file(path) {
                warn!(path = %path.display(), "rollback could not remove file: {e}");
            }
        }
        for (target, backup) in self.replaced.iter().rev() {
            if let Err(e) = fs::rename(backup, target) {
                warn!(path = %target.display(), "rollback could not restore file: {e}");
            }
        }
        for dir in self.created_dirs.iter().rev() {
            let _ = fs::remove_dir(dir);
        }
    }
}

fn ensure_parent(target: &Path, created: &mut Vec<PathBuf>) -> std::io::Result<()> {
    let Some(parent) = target.parent() else { return Ok(()) };
    if parent.exists() {
        return Ok(());
    }
    fs::create_dir_all(parent)?;
    created.push(parent.to_path_buf());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charts::{ChartArtifact, ChartKind};

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn commit_moves_files_and_removes_staging() {
        let out = tempfile::tempdir().unwrap();
        let mut staging = Staging::new(out.path()).unwrap();
        staging.write(Path::new("report.html"), b"<html/>").unwrap();
        staging.write(Path::new("charts/daily_trend.svg"), b"<svg/>").unwrap();
        let committed = staging.commit().unwrap();

        assert_eq!(committed.len(), 2);
        assert_eq!(entries(out.path()), vec!["charts", "report.html"]);
        assert_eq!(fs::read(out.path().join("charts/daily_trend.svg")).unwrap(), b"<svg/>");
    }

    #[test]
    fn dropped_staging_leaves_nothing() {
        let out = tempfile::tempdir().unwrap();
        {
            let mut staging = Staging::new(out.path()).unwrap();
            staging.write(Path::new("report.html"), b"<html/>").unwrap();
        }
        assert!(entries(out.path()).is_empty());
    }

    #[test]
    fn failed_commit_rolls_back_moved_files() {
        let out = tempfile::tempdir().unwrap();
        // A directory where a document should go makes the second move fail.
        fs::create_dir_all(out.path().join("b.md/occupied")).unwrap();

        let mut staging = Staging::new(out.path()).unwrap();
        staging.write(Path::new("charts/a.svg"), b"a").unwrap();
        staging.write(Path::new("b.md"), b"b").unwrap();
        let err = staging.commit().unwrap_err();

        assert_eq!(err.kind(), crate::error::ErrorKind::Io);
        assert_eq!(entries(out.path()), vec!["b.md"]);
    }

    #[test]
    fn commit_replaces_an_earlier_report() {
        let out = tempfile::tempdir().unwrap();
        fs::write(out.path().join("report.html"), b"old").unwrap();

        let mut staging = Staging::new(out.path()).unwrap();
        staging.write(Path::new("report.html"), b"new").unwrap();
        staging.commit().unwrap();

        assert_eq!(fs::read(out.path().join("report.html")).unwrap(), b"new");
        assert_eq!(entries(out.path()), vec!["report.html"]);
    }

    #[test]
    fn failed_commit_restores_replaced_files() {
        let out = tempfile::tempdir().unwrap();
        fs::write(out.path().join("report.html"), b"old").unwrap();
        fs::create_dir_all(out.path().join("b.md/occupied")).unwrap();

        let mut staging = Staging::new(out.path()).unwrap();
        staging.write(Path::new("report.html"), b"new").unwrap();
        staging.write(Path::new("b.md"), b"b").unwrap();
        assert!(staging.commit().is_err());

        assert_eq!(fs::read(out.path().join("report.html")).unwrap(), b"old");
        assert_eq!(entries(out.path()), vec!["b.md", "report.html"]);
    }

    #[test]
    fn write_outputs_writes_documents_charts_and_exports() {
        let out = tempfile::tempdir().unwrap();
        let d = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let meta = ReportMeta {
            client_name: "Acme".to_string(),
            week_start: d,
            week_end: d,
            base_name: "Acme_2025-01-01_to_2025-01-01".to_string(),
        };
        let mut charts = ChartSet::new();
        for kind in ChartKind::REQUIRED {
            charts.insert(ChartArtifact {
                kind,
                svg: "<svg/>".to_string(),
            });
        }
        let report = SummaryReport::default();
        let narrative = Narrative::new("All good.");
        let highlights = Highlights::default();
        let bundle = ReportBundle {
            meta: &meta,
            report: &report,
            narrative: &narrative,
            highlights: &highlights,
            charts: &charts,
        };

        let renderers = renderers_for(&[OutputFormat::Html, OutputFormat::Slides]);
        let written = write_outputs(out.path(), &bundle, &renderers, Some(&[])).unwrap();

        assert_eq!(written.len(), 6);
        assert_eq!(
            entries(out.path()),
            vec![
                "Acme_2025-01-01_to_2025-01-01.html",
                "Acme_2025-01-01_to_2025-01-01.slides.md",
                "charts",
                "dataset.csv",
                "summary.json"
            ]
        );
    }
}
