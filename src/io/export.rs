//! Export the analytics dataset and summary.
//!
//! The exports are meant to be easy to consume in spreadsheets or downstream
//! scripts. Values are written at full precision; undefined ratios are empty
//! cells in the CSV and `null` in the JSON.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::domain::{MetricsRow, SummaryReport};
use crate::error::AppError;

pub const DATASET_FILE: &str = "dataset.csv";
pub const SUMMARY_FILE: &str = "summary.json";

const DATASET_HEADER: [&str; 15] = [
    "campaign_id",
    "date",
    "location",
    "impressions",
    "clicks",
    "spend",
    "conversions",
    "weather_condition",
    "temperature_c",
    "rainfall_mm",
    "ctr",
    "cpc",
    "cpa",
    "cvr",
    "spend_ratio",
];

/// Write one line per metrics row.
pub fn write_dataset_csv<W: Write>(writer: W, rows: &[MetricsRow]) -> Result<(), AppError> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(DATASET_HEADER)
        .map_err(|e| AppError::io(format!("Failed to write dataset CSV header: {e}")))?;

    for row in rows {
        let r = &row.record;
        let weather = r.weather.as_ref();
        let record = [
            r.campaign_id.clone(),
            r.date.to_string(),
            r.location.clone().unwrap_or_default(),
            r.impressions.to_string(),
            r.clicks.to_string(),
            r.spend.to_string(),
            r.conversions.to_string(),
            weather.and_then(|w| w.condition.clone()).unwrap_or_default(),
            opt(weather.and_then(|w| w.temperature_c)),
            opt(weather.and_then(|w| w.rainfall_mm)),
            opt(row.ratios.ctr),
            opt(row.ratios.cpc),
            opt(row.ratios.cpa),
            opt(row.ratios.cvr),
            opt(row.spend_ratio),
        ];
        wtr.write_record(&record)
            .map_err(|e| AppError::io(format!("Failed to write dataset CSV row: {e}")))?;
    }

    wtr.flush()
        .map_err(|e| AppError::io(format!("Failed to flush dataset CSV: {e}")))?;
    Ok(())
}

/// Write the dataset CSV to `path` (used by `inspect --export`).
pub fn write_dataset_csv_file(path: &Path, rows: &[MetricsRow]) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::io(format!("Failed to create export CSV '{}': {e}", path.display())))?;
    write_dataset_csv(file, rows)
}

pub fn write_summary_json<W: Write>(writer: W, report: &SummaryReport) -> Result<(), AppError> {
    serde_json::to_writer_pretty(writer, report)
        .map_err(|e| AppError::io(format!("Failed to write summary JSON: {e}")))
}

fn opt(v: Option<f64>) -> String {
    v.map(|x| x.to_string()).unwrap_or_default()
}
