//! CSV ingest and validation.
//!
//! Turns the traffic, clicks and weather exports into typed `RecordSet`s keyed
//! by `(campaign_id, date)`. Nothing partially typed leaves this module:
//!
//! - **Strict schema**: a missing required column fails the source.
//! - **Row-level validation**: bad rows (unparseable date, negative or
//!   non-numeric values, empty campaign id) are rejected and reported.
//! - **One record per key**: repeated keys are collapsed the way the upstream
//!   export tooling does (counts and spend summed, temperature averaged,
//!   rainfall summed).

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use csv::StringRecord;
use tracing::{info, warn};

use crate::config::DataSources;
use crate::domain::{Field, Record, RecordSet, SourceKind, SourceTables, WeatherContext};
use crate::error::AppError;

/// Row errors beyond this many are counted but not logged individually.
const MAX_LOGGED_ROW_ERRORS: usize = 20;

/// A row-level error encountered during ingest.
#[derive(Debug, Clone, PartialEq)]
pub struct RowError {
    pub line: usize,
    pub campaign_id: Option<String>,
    pub message: String,
}

/// What happened while reading one source.
#[derive(Debug, Clone)]
pub struct IngestReport {
    pub source: SourceKind,
    pub rows_read: usize,
    pub rows_used: usize,
    pub records: usize,
    pub row_errors: Vec<RowError>,
}

/// Ingest output: typed tables plus per-source reports.
#[derive(Debug, Clone)]
pub struct IngestedSources {
    pub tables: SourceTables,
    pub reports: Vec<IngestReport>,
}

/// A CSV read into memory with its normalized header map.
struct RawTable {
    header_map: HashMap<String, usize>,
    rows: Vec<(usize, StringRecord)>,
    row_errors: Vec<RowError>,
}

struct TrafficRow {
    campaign_id: String,
    date: NaiveDate,
    location: Option<String>,
    impressions: u64,
}

/// Load every configured source.
pub fn load_sources(sources: &DataSources) -> Result<IngestedSources, AppError> {
    let traffic_raw = read_table(open(&sources.traffic_csv)?, SourceKind::Traffic)?;
    let (traffic_rows, traffic_report) = parse_traffic(traffic_raw)?;
    let traffic = traffic_set(&traffic_rows)?;

    let clicks_raw = read_table(open(&sources.clicks_csv)?, SourceKind::Clicks)?;
    let (clicks, clicks_report) = parse_clicks(clicks_raw)?;

    let mut reports = vec![finish_report(traffic_report, &traffic), finish_report(clicks_report, &clicks)];

    let weather = match &sources.weather_csv {
        Some(path) => {
            let raw = read_table(open(path)?, SourceKind::Weather)?;
            let (set, report) = parse_weather(raw, &traffic_rows)?;
            reports.push(finish_report(report, &set));
            Some(set)
        }
        None => None,
    };

    for report in &reports {
        log_report(report);
    }

    Ok(IngestedSources {
        tables: SourceTables {
            traffic,
            clicks,
            weather,
        },
        reports,
    })
}

fn open(path: &Path) -> Result<File, AppError> {
    File::open(path).map_err(|e| AppError::io(format!("Failed to open CSV '{}': {e}", path.display())))
}

fn read_table<R: Read>(reader: R, source: SourceKind) -> Result<RawTable, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| AppError::schema(format!("Failed to read {source} CSV headers: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);

    let mut rows = Vec::new();
    let mut row_errors = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        // Header is line 1.
        let line = idx + 2;
        match result {
            Ok(record) => rows.push((line, record)),
            Err(e) => row_errors.push(RowError {
                line,
                campaign_id: None,
                message: format!("CSV parse error: {e}"),
            }),
        }
    }

    Ok(RawTable {
        header_map,
        rows,
        row_errors,
    })
}

fn parse_traffic(raw: RawTable) -> Result<(Vec<TrafficRow>, IngestReport), AppError> {
    ensure_columns(SourceKind::Traffic, &raw.header_map, &["date", "campaign_id", "impressions"])?;

    let mut report = new_report(SourceKind::Traffic, &raw);
    let mut rows = Vec::new();
    for (line, record) in &raw.rows {
        match traffic_row(record, &raw.header_map) {
            Ok(row) => rows.push(row),
            Err(message) => report.row_errors.push(row_error(*line, record, &raw.header_map, message)),
        }
    }

    require_rows(SourceKind::Traffic, rows.len())?;
    report.rows_used = rows.len();
    Ok((rows, report))
}

/// Collapse traffic rows to one record per key.
///
/// A key seen under several locations keeps no location.
fn traffic_set(rows: &[TrafficRow]) -> Result<RecordSet, AppError> {
    let mut acc: BTreeMap<(&str, NaiveDate), (u64, BTreeSet<&str>)> = BTreeMap::new();
    for row in rows {
        let entry = acc.entry((row.campaign_id.as_str(), row.date)).or_default();
        entry.0 = sum_count(entry.0, row.impressions, "impressions", &row.campaign_id, row.date)?;
        if let Some(loc) = row.location.as_deref() {
            entry.1.insert(loc);
        }
    }

    let records = acc
        .into_iter()
        .map(|((campaign_id, date), (impressions, locations))| Record {
            impressions: Some(impressions),
            location: match locations.len() {
                1 => locations.into_iter().next().map(str::to_string),
                _ => None,
            },
            ..Record::keyed(campaign_id, date)
        })
        .collect();

    Ok(RecordSet::new(
        SourceKind::Traffic,
        [Field::CampaignId, Field::Date, Field::Impressions, Field::Location],
        records,
    ))
}

fn parse_clicks(raw: RawTable) -> Result<(RecordSet, IngestReport), AppError> {
    ensure_columns(
        SourceKind::Clicks,
        &raw.header_map,
        &["date", "campaign_id", "clicks", "conversions", "spend"],
    )?;

    let mut report = new_report(SourceKind::Clicks, &raw);
    let mut acc: BTreeMap<(String, NaiveDate), (u64, u64, f64)> = BTreeMap::new();
    for (line, record) in &raw.rows {
        match clicks_row(record, &raw.header_map) {
            Ok(((campaign_id, date), clicks, conversions, spend)) => {
                let entry = acc.entry((campaign_id.clone(), date)).or_default();
                entry.0 = sum_count(entry.0, clicks, "clicks", &campaign_id, date)?;
                entry.1 = sum_count(entry.1, conversions, "conversions", &campaign_id, date)?;
                entry.2 += spend;
                report.rows_used += 1;
            }
            Err(message) => report.row_errors.push(row_error(*line, record, &raw.header_map, message)),
        }
    }

    require_rows(SourceKind::Clicks, report.rows_used)?;

    let records = acc
        .into_iter()
        .map(|((campaign_id, date), (clicks, conversions, spend))| Record {
            clicks: Some(clicks),
            conversions: Some(conversions),
            spend: Some(spend),
            ..Record::keyed(campaign_id, date)
        })
        .collect();

    let set = RecordSet::new(
        SourceKind::Clicks,
        [Field::CampaignId, Field::Date, Field::Clicks, Field::Conversions, Field::Spend],
        records,
    );
    Ok((set, report))
}

#[derive(Default)]
struct WeatherAcc {
    condition: Option<String>,
    temperatures: Vec<f64>,
    rainfall_mm: Option<f64>,
}

impl WeatherAcc {
    fn add(&mut self, condition: Option<String>, temperature_c: Option<f64>, rainfall_mm: Option<f64>) {
        if self.condition.is_none() {
            self.condition = condition;
        }
        self.temperatures.extend(temperature_c);
        if let Some(r) = rainfall_mm {
            *self.rainfall_mm.get_or_insert(0.0) += r;
        }
    }

    fn finish(self) -> WeatherContext {
        let temperature_c = if self.temperatures.is_empty() {
            None
        } else {
            Some(self.temperatures.iter().sum::<f64>() / self.temperatures.len() as f64)
        };
        WeatherContext {
            condition: self.condition,
            temperature_c,
            rainfall_mm: self.rainfall_mm,
        }
    }
}

/// Weather may be keyed by campaign or by location. Location-keyed rows are
/// attached to every campaign whose traffic shares that `(date, location)`;
/// when a campaign ran in several locations that day, the alphabetically
/// first location's weather is used.
fn parse_weather(raw: RawTable, traffic: &[TrafficRow]) -> Result<(RecordSet, IngestReport), AppError> {
    ensure_columns(SourceKind::Weather, &raw.header_map, &["date"])?;
    let by_campaign = raw.header_map.contains_key("campaign_id");
    if !by_campaign && !raw.header_map.contains_key("location") {
        return Err(AppError::schema(
            "weather CSV needs a `campaign_id` or a `location` column.",
        ));
    }

    let mut report = new_report(SourceKind::Weather, &raw);
    let key_column = if by_campaign { "campaign_id" } else { "location" };
    let mut acc: BTreeMap<(String, NaiveDate), WeatherAcc> = BTreeMap::new();

    for (line, record) in &raw.rows {
        match weather_row(record, &raw.header_map, key_column) {
            Ok(row) => {
                acc.entry((row.key, row.date))
                    .or_default()
                    .add(row.condition, row.temperature_c, row.rainfall_mm);
                report.rows_used += 1;
            }
            Err(message) => report.row_errors.push(row_error(*line, record, &raw.header_map, message)),
        }
    }

    require_rows(SourceKind::Weather, report.rows_used)?;

    let contexts: BTreeMap<(String, NaiveDate), WeatherContext> = acc
        .into_iter()
        .map(|(key, a)| (key, a.finish()))
        .filter(|(_, w)| !w.is_empty())
        .collect();

    let records: Vec<Record> = if by_campaign {
        contexts
            .into_iter()
            .map(|((campaign_id, date), w)| Record {
                weather: Some(w),
                ..Record::keyed(campaign_id, date)
            })
            .collect()
    } else {
        attach_location_weather(&contexts, traffic)
    };

    let set = RecordSet::new(SourceKind::Weather, [Field::CampaignId, Field::Date, Field::Weather], records);
    Ok((set, report))
}

fn attach_location_weather(
    by_location: &BTreeMap<(String, NaiveDate), WeatherContext>,
    traffic: &[TrafficRow],
) -> Vec<Record> {
    let mut picked: BTreeMap<(&str, NaiveDate), (&str, &WeatherContext)> = BTreeMap::new();
    for row in traffic {
        let Some(location) = row.location.as_deref() else { continue };
        let Some(w) = by_location.get(&(location.to_string(), row.date)) else { continue };
        let entry = picked.entry((row.campaign_id.as_str(), row.date)).or_insert((location, w));
        if location < entry.0 {
            *entry = (location, w);
        }
    }

    picked
        .into_iter()
        .map(|((campaign_id, date), (_, w))| Record {
            weather: Some(w.clone()),
            ..Record::keyed(campaign_id, date)
        })
        .collect()
}

fn traffic_row(record: &StringRecord, header_map: &HashMap<String, usize>) -> Result<TrafficRow, String> {
    let (campaign_id, date) = parse_key(record, header_map)?;
    Ok(TrafficRow {
        campaign_id,
        date,
        location: get_optional(record, header_map, "location").map(str::to_string),
        impressions: parse_count(record, header_map, "impressions")?,
    })
}

type ClicksRow = ((String, NaiveDate), u64, u64, f64);

fn clicks_row(record: &StringRecord, header_map: &HashMap<String, usize>) -> Result<ClicksRow, String> {
    let key = parse_key(record, header_map)?;
    let clicks = parse_count(record, header_map, "clicks")?;
    let conversions = parse_count(record, header_map, "conversions")?;
    let spend = parse_amount(record, header_map, "spend")?;
    Ok((key, clicks, conversions, spend))
}

struct WeatherRow {
    key: String,
    date: NaiveDate,
    condition: Option<String>,
    temperature_c: Option<f64>,
    rainfall_mm: Option<f64>,
}

fn weather_row(
    record: &StringRecord,
    header_map: &HashMap<String, usize>,
    key_column: &str,
) -> Result<WeatherRow, String> {
    let key = get_required(record, header_map, key_column)?.to_string();
    let date = parse_date(get_required(record, header_map, "date")?)?;
    let condition = get_optional(record, header_map, "weather_condition")
        .or_else(|| get_optional(record, header_map, "condition"))
        .map(str::to_string);
    let temperature_c = parse_opt_f64(record, header_map, "temperature_c")?;
    let rainfall_mm = parse_opt_f64(record, header_map, "rainfall_mm")?;
    if rainfall_mm.is_some_and(|r| r < 0.0) {
        return Err("Negative `rainfall_mm`.".to_string());
    }
    Ok(WeatherRow {
        key,
        date,
        condition,
        temperature_c,
        rainfall_mm,
    })
}

fn new_report(source: SourceKind, raw: &RawTable) -> IngestReport {
    IngestReport {
        source,
        rows_read: raw.rows.len() + raw.row_errors.len(),
        rows_used: 0,
        records: 0,
        row_errors: raw.row_errors.clone(),
    }
}

fn finish_report(mut report: IngestReport, set: &RecordSet) -> IngestReport {
    report.records = set.len();
    report
}

fn log_report(report: &IngestReport) {
    for e in report.row_errors.iter().take(MAX_LOGGED_ROW_ERRORS) {
        warn!(
            source = %report.source,
            line = e.line,
            campaign_id = e.campaign_id.as_deref().unwrap_or(""),
            "rejected row: {}",
            e.message
        );
    }
    if report.row_errors.len() > MAX_LOGGED_ROW_ERRORS {
        warn!(
            source = %report.source,
            suppressed = report.row_errors.len() - MAX_LOGGED_ROW_ERRORS,
            "further rejected rows not logged"
        );
    }
    info!(
        source = %report.source,
        rows_read = report.rows_read,
        rows_used = report.rows_used,
        records = report.records,
        rejected = report.row_errors.len(),
        "ingested source"
    );
}

fn require_rows(source: SourceKind, used: usize) -> Result<(), AppError> {
    if used == 0 {
        return Err(AppError::schema(format!("No valid rows in {source} CSV.")));
    }
    Ok(())
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports often prefix the first header with a UTF-8 BOM.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

fn ensure_columns(source: SourceKind, header_map: &HashMap<String, usize>, required: &[&str]) -> Result<(), AppError> {
    let missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|c| !header_map.contains_key(*c))
        .collect();
    if missing.is_empty() {
        return Ok(());
    }
    Err(AppError::schema(format!(
        "{source} CSV is missing required column(s): {}",
        missing.iter().map(|c| format!("`{c}`")).collect::<Vec<_>>().join(", ")
    )))
}

fn row_error(line: usize, record: &StringRecord, header_map: &HashMap<String, usize>, message: String) -> RowError {
    RowError {
        line,
        campaign_id: get_optional(record, header_map, "campaign_id").map(str::to_string),
        message,
    }
}

fn parse_key(record: &StringRecord, header_map: &HashMap<String, usize>) -> Result<(String, NaiveDate), String> {
    let campaign_id = get_required(record, header_map, "campaign_id")?.to_string();
    let date = parse_date(get_required(record, header_map, "date")?)?;
    Ok((campaign_id, date))
}

fn get_required<'a>(
    record: &'a StringRecord,
    header_map: &HashMap<String, usize>,
    name: &str,
) -> Result<&'a str, String> {
    let idx = header_map
        .get(name)
        .ok_or_else(|| format!("Missing required column: `{name}`"))?;
    record
        .get(*idx)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("Missing required value: `{name}`"))
}

fn get_optional<'a>(record: &'a StringRecord, header_map: &HashMap<String, usize>, name: &str) -> Option<&'a str> {
    let idx = header_map.get(name)?;
    record.get(*idx).map(str::trim).filter(|s| !s.is_empty())
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    // ISO dates are preferred, but spreadsheet exports often use day-first
    // formats. The set is small and fixed so parsing stays deterministic.
    const FMTS: [&str; 4] = ["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%Y/%m/%d"];
    for fmt in FMTS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(d);
        }
    }
    Err(format!(
        "Invalid date '{s}'. Expected one of: YYYY-MM-DD, DD/MM/YYYY, DD-MM-YYYY, YYYY/MM/DD."
    ))
}

fn parse_number(s: &str, name: &str) -> Result<f64, String> {
    let v = s
        .replace(',', "")
        .parse::<f64>()
        .map_err(|_| format!("Invalid `{name}` value '{s}'."))?;
    if !v.is_finite() {
        return Err(format!("Non-finite `{name}` value '{s}'."));
    }
    Ok(v)
}

/// A required non-negative whole number, parsed exactly.
///
/// Thousands separators and an all-zero fraction (`1,200.00`) are accepted.
fn parse_count(record: &StringRecord, header_map: &HashMap<String, usize>, name: &str) -> Result<u64, String> {
    let raw = get_required(record, header_map, name)?;
    let cleaned = raw.replace(',', "");
    let whole = match cleaned.split_once('.') {
        Some((whole, frac)) if !frac.is_empty() && frac.bytes().all(|b| b == b'0') => whole,
        _ => cleaned.as_str(),
    };
    whole
        .parse::<u64>()
        .map_err(|_| format!("`{name}` must be a non-negative whole number, got '{raw}'."))
}

/// Add a duplicate row's count to the running total for its key.
fn sum_count(total: u64, value: u64, name: &str, campaign_id: &str, date: NaiveDate) -> Result<u64, AppError> {
    total.checked_add(value).ok_or_else(|| {
        AppError::type_mismatch(format!(
            "`{name}` for ({campaign_id}, {date}) exceeds the largest representable count."
        ))
    })
}

/// A required non-negative amount.
fn parse_amount(record: &StringRecord, header_map: &HashMap<String, usize>, name: &str) -> Result<f64, String> {
    let raw = get_required(record, header_map, name)?;
    let v = parse_number(raw, name)?;
    if v < 0.0 {
        return Err(format!("`{name}` must be non-negative, got '{raw}'."));
    }
    Ok(v)
}

fn parse_opt_f64(
    record: &StringRecord,
    header_map: &HashMap<String, usize>,
    name: &str,
) -> Result<Option<f64>, String> {
    get_optional(record, header_map, name)
        .map(|s| parse_number(s, name))
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn raw(csv: &str, source: SourceKind) -> RawTable {
        read_table(csv.as_bytes(), source).unwrap()
    }

    #[test]
    fn traffic_collapses_duplicate_keys_and_locations() {
        let csv = "\u{feff}Date,Campaign_ID,Location,Impressions\n\
                   2024-01-01,A,Pune,100\n\
                   2024-01-01,A,Mumbai,50\n\
                   02/01/2024,A,Pune,70\n";
        let (rows, report) = parse_traffic(raw(csv, SourceKind::Traffic)).unwrap();
        assert_eq!(report.rows_used, 3);
        let set = traffic_set(&rows).unwrap();

        assert_eq!(set.len(), 2);
        assert_eq!(set.records[0].date, day(1));
        assert_eq!(set.records[0].impressions, Some(150));
        assert_eq!(set.records[0].location, None);
        assert_eq!(set.records[1].date, day(2));
        assert_eq!(set.records[1].location.as_deref(), Some("Pune"));
    }

    #[test]
    fn bad_rows_are_rejected_not_passed_through() {
        let csv = "date,campaign_id,impressions\n\
                   2024-01-01,A,100\n\
                   2024-13-45,A,100\n\
                   2024-01-02,,100\n\
                   2024-01-03,A,-5\n\
                   2024-01-04,A,1.5\n\
                   2024-01-05,A,abc\n";
        let (rows, report) = parse_traffic(raw(csv, SourceKind::Traffic)).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(report.row_errors.len(), 5);
        assert_eq!(report.row_errors[0].line, 3);
        assert!(report.row_errors[0].message.contains("Invalid date"));
    }

    #[test]
    fn counts_are_parsed_exactly() {
        // 2^53 + 1 is not representable as f64.
        let csv = "date,campaign_id,impressions\n\
                   2024-01-01,A,9007199254740993\n\
                   2024-01-02,A,\"1,200.00\"\n\
                   2024-01-03,A,18446744073709551616\n";
        let (rows, report) = parse_traffic(raw(csv, SourceKind::Traffic)).unwrap();
        let set = traffic_set(&rows).unwrap();

        assert_eq!(set.records[0].impressions, Some(9_007_199_254_740_993));
        assert_eq!(set.records[1].impressions, Some(1200));
        assert_eq!(report.row_errors.len(), 1, "u64::MAX + 1 is rejected");
    }

    #[test]
    fn overflowing_duplicate_sum_is_type_error() {
        let csv = "date,campaign_id,clicks,conversions,spend\n\
                   2024-01-01,A,18446744073709551615,0,1\n\
                   2024-01-01,A,1,0,1\n";
        let err = parse_clicks(raw(csv, SourceKind::Clicks)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Type);
        assert!(err.message().contains("`clicks`"));
    }

    #[test]
    fn missing_required_column_is_schema_error() {
        let csv = "date,campaign_id,clicks,spend\n2024-01-01,A,1,1.0\n";
        let err = parse_clicks(raw(csv, SourceKind::Clicks)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Schema);
        assert!(err.message().contains("`conversions`"));
    }

    #[test]
    fn source_without_valid_rows_is_schema_error() {
        let csv = "date,campaign_id,clicks,conversions,spend\nnope,A,1,1,1\n";
        let err = parse_clicks(raw(csv, SourceKind::Clicks)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Schema);
    }

    #[test]
    fn clicks_sum_duplicates() {
        let csv = "date,campaign_id,clicks,conversions,spend\n\
                   2024-01-01,A,10,1,5.50\n\
                   2024-01-01,A,5,0,\"1,000.25\"\n";
        let (set, _) = parse_clicks(raw(csv, SourceKind::Clicks)).unwrap();
        assert_eq!(set.len(), 1);
        let r = &set.records[0];
        assert_eq!(r.clicks, Some(15));
        assert_eq!(r.conversions, Some(1));
        assert!((r.spend.unwrap() - 1005.75).abs() < 1e-9);
    }

    #[test]
    fn location_weather_attaches_to_campaigns() {
        let traffic_csv = "date,campaign_id,location,impressions\n\
                           2024-01-01,A,Pune,100\n\
                           2024-01-01,B,Delhi,100\n\
                           2024-01-01,B,Agra,100\n";
        let (rows, _) = parse_traffic(raw(traffic_csv, SourceKind::Traffic)).unwrap();
        let weather_csv = "date,location,temperature_c,rainfall_mm\n\
                           2024-01-01,Pune,20,1.5\n\
                           2024-01-01,Pune,24,2.0\n\
                           2024-01-01,Agra,30,0\n\
                           2024-01-01,Delhi,28,0\n";
        let (set, _) = parse_weather(raw(weather_csv, SourceKind::Weather), &rows).unwrap();

        assert_eq!(set.len(), 2);
        let a = set.records[0].weather.as_ref().unwrap();
        assert_eq!(set.records[0].campaign_id, "A");
        assert!((a.temperature_c.unwrap() - 22.0).abs() < 1e-12);
        assert!((a.rainfall_mm.unwrap() - 3.5).abs() < 1e-12);
        let b = set.records[1].weather.as_ref().unwrap();
        assert!((b.temperature_c.unwrap() - 30.0).abs() < 1e-12, "Agra sorts before Delhi");
    }

    #[test]
    fn campaign_weather_reads_condition() {
        let csv = "date,campaign_id,weather_condition\n2024-01-01,A,rain\n";
        let (set, _) = parse_weather(raw(csv, SourceKind::Weather), &[]).unwrap();
        assert_eq!(set.records[0].weather.as_ref().unwrap().condition.as_deref(), Some("rain"));
        assert!(set.has_column(Field::Weather));
    }

    #[test]
    fn load_sources_reads_files() {
        let dir = tempfile::tempdir().unwrap();
        let traffic = dir.path().join("traffic.csv");
        let clicks = dir.path().join("clicks.csv");
        std::fs::write(&traffic, "date,campaign_id,impressions\n2024-01-01,A,1000\n").unwrap();
        std::fs::write(&clicks, "date,campaign_id,clicks,conversions,spend\n2024-01-01,A,50,0,25.00\n").unwrap();

        let ingested = load_sources(&DataSources {
            traffic_csv: traffic,
            clicks_csv: clicks,
            weather_csv: None,
        })
        .unwrap();

        assert_eq!(ingested.tables.traffic.len(), 1);
        assert_eq!(ingested.tables.clicks.len(), 1);
        assert!(ingested.tables.weather.is_none());
        assert_eq!(ingested.reports.len(), 2);
        assert_eq!(ingested.reports[0].records, 1);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_sources(&DataSources {
            traffic_csv: "/nonexistent/traffic.csv".into(),
            clicks_csv: "/nonexistent/clicks.csv".into(),
            weather_csv: None,
        })
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
