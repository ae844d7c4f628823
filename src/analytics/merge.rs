//! Full outer join of the source tables on `(campaign_id, date)`.
//!
//! Field ownership follows the exports: traffic carries impressions and
//! location, clicks carries clicks/spend/conversions, weather carries the
//! weather context. If two sources carry the same field for the same key, the
//! `MergePolicy` decides: the higher-precedence source wins, or the run fails
//! with a merge conflict.

use std::collections::{BTreeMap, HashSet};
use std::fmt::Debug;

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::domain::{
    ConflictMode, ContextFill, Field, MergePolicy, MergedRecord, MergedRecordSet, RecordSet, SourceKind,
    WeatherContext,
};
use crate::error::AppError;

type Key = (String, NaiveDate);

/// A field value together with the source that supplied it.
#[derive(Debug)]
struct Sourced<T> {
    value: T,
    source: SourceKind,
}

/// Values collected for one key across all sources.
#[derive(Debug, Default)]
struct Slot {
    location: Option<Sourced<String>>,
    impressions: Option<Sourced<u64>>,
    clicks: Option<Sourced<u64>>,
    spend: Option<Sourced<f64>>,
    conversions: Option<Sourced<u64>>,
    weather: Option<Sourced<WeatherContext>>,
}

/// Per-record context used when assigning fields into a slot.
struct Assign<'a> {
    campaign_id: &'a str,
    date: NaiveDate,
    source: SourceKind,
    mode: ConflictMode,
}

/// Merge traffic, clicks and optional weather into one row per key.
pub fn merge(
    traffic: &RecordSet,
    clicks: &RecordSet,
    weather: Option<&RecordSet>,
    policy: &MergePolicy,
) -> Result<MergedRecordSet, AppError> {
    let mut inputs = vec![traffic, clicks];
    inputs.extend(weather);
    merge_sets(&inputs, policy)
}

/// Merge any number of source tables.
///
/// Sources are folded in precedence order, so a value already in a slot always
/// comes from a higher-precedence source than the one being applied.
pub fn merge_sets(inputs: &[&RecordSet], policy: &MergePolicy) -> Result<MergedRecordSet, AppError> {
    for set in inputs {
        ensure_key_columns(set)?;
        if policy.rank(set.source) >= policy.precedence.len() {
            return Err(AppError::config(format!(
                "Merge precedence does not list source `{}`.",
                set.source
            )));
        }
    }

    let mut ordered = inputs.to_vec();
    ordered.sort_by_key(|set| policy.rank(set.source));

    let mut slots: BTreeMap<Key, Slot> = BTreeMap::new();
    for set in ordered {
        let mut seen: HashSet<(&str, NaiveDate)> = HashSet::with_capacity(set.len());
        for record in &set.records {
            if record.campaign_id.trim().is_empty() {
                return Err(AppError::schema(format!(
                    "{} record dated {} has an empty `campaign_id`.",
                    set.source, record.date
                )));
            }
            if !seen.insert(record.key()) {
                return Err(AppError::merge_conflict(format!(
                    "{} has more than one record for ({}, {}).",
                    set.source, record.campaign_id, record.date
                )));
            }

            let ctx = Assign {
                campaign_id: &record.campaign_id,
                date: record.date,
                source: set.source,
                mode: policy.on_conflict,
            };
            let slot = slots.entry((record.campaign_id.clone(), record.date)).or_default();

            assign(&mut slot.location, record.location.clone(), Field::Location, &ctx)?;
            assign(&mut slot.impressions, record.impressions, Field::Impressions, &ctx)?;
            assign(&mut slot.clicks, record.clicks, Field::Clicks, &ctx)?;
            assign(&mut slot.spend, record.spend, Field::Spend, &ctx)?;
            assign(&mut slot.conversions, record.conversions, Field::Conversions, &ctx)?;
            let weather = record.weather.clone().filter(|w| !w.is_empty());
            assign(&mut slot.weather, weather, Field::Weather, &ctx)?;
        }
    }

    let mut records = Vec::with_capacity(slots.len());
    for ((campaign_id, date), slot) in slots {
        records.push(finish(campaign_id, date, slot)?);
    }

    if policy.context_fill == ContextFill::CarryForward {
        carry_forward_weather(&mut records);
    }

    info!(
        sources = inputs.len(),
        rows = records.len(),
        "merged source tables"
    );

    Ok(MergedRecordSet { records })
}

fn ensure_key_columns(set: &RecordSet) -> Result<(), AppError> {
    for field in [Field::CampaignId, Field::Date] {
        if !set.has_column(field) {
            return Err(AppError::schema(format!(
                "{} input is missing key column `{}`.",
                set.source,
                field.column_name()
            )));
        }
    }
    Ok(())
}

fn assign<T: PartialEq + Debug>(
    slot: &mut Option<Sourced<T>>,
    incoming: Option<T>,
    field: Field,
    ctx: &Assign<'_>,
) -> Result<(), AppError> {
    let Some(value) = incoming else {
        return Ok(());
    };

    match slot {
        None => {
            *slot = Some(Sourced {
                value,
                source: ctx.source,
            });
        }
        Some(existing) if existing.value == value => {}
        Some(existing) => match ctx.mode {
            ConflictMode::Precedence => {
                debug!(
                    campaign_id = ctx.campaign_id,
                    date = %ctx.date,
                    field = field.column_name(),
                    kept = %existing.source,
                    dropped = %ctx.source,
                    "conflicting field resolved by precedence"
                );
            }
            ConflictMode::Reject => {
                return Err(AppError::merge_conflict(format!(
                    "`{}` for ({}, {}) differs between {} ({:?}) and {} ({:?}).",
                    field.column_name(),
                    ctx.campaign_id,
                    ctx.date,
                    existing.source,
                    existing.value,
                    ctx.source,
                    value,
                )));
            }
        },
    }
    Ok(())
}

fn finish(campaign_id: String, date: NaiveDate, slot: Slot) -> Result<MergedRecord, AppError> {
    let impressions = slot.impressions.map_or(0, |s| s.value);
    let clicks = slot.clicks.map_or(0, |s| s.value);
    let conversions = slot.conversions.map_or(0, |s| s.value);
    let spend = coerce_amount(slot.spend.map(|s| s.value), Field::Spend, &campaign_id, date)?;

    Ok(MergedRecord {
        location: slot.location.map(|s| s.value),
        weather: slot.weather.map(|s| s.value),
        campaign_id,
        date,
        impressions,
        clicks,
        spend,
        conversions,
    })
}

fn coerce_amount(value: Option<f64>, field: Field, campaign_id: &str, date: NaiveDate) -> Result<f64, AppError> {
    let Some(v) = value else { return Ok(0.0) };
    if !v.is_finite() || v < 0.0 {
        return Err(AppError::type_mismatch(format!(
            "`{}` for ({campaign_id}, {date}) is not a non-negative amount: {v}",
            field.column_name()
        )));
    }
    Ok(v)
}

/// Records are sorted by `(campaign_id, date)`, so a single pass suffices.
fn carry_forward_weather(records: &mut [MergedRecord]) {
    let mut last: Option<(String, WeatherContext)> = None;
    for record in records.iter_mut() {
        if let Some(w) = &record.weather {
            last = Some((record.campaign_id.clone(), w.clone()));
            continue;
        }
        let carried = last
            .as_ref()
            .filter(|(campaign_id, _)| *campaign_id == record.campaign_id)
            .map(|(_, w)| w.clone());
        if carried.is_none() {
            last = None;
        }
        record.weather = carried;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ConflictMode, Record};
    use crate::error::ErrorKind;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn traffic(rows: &[(&str, u32, u64)]) -> RecordSet {
        let records = rows
            .iter()
            .map(|&(c, d, impressions)| Record {
                impressions: Some(impressions),
                ..Record::keyed(c, day(d))
            })
            .collect();
        RecordSet::new(
            SourceKind::Traffic,
            [Field::CampaignId, Field::Date, Field::Impressions],
            records,
        )
    }

    fn clicks(rows: &[(&str, u32, u64, f64, u64)]) -> RecordSet {
        let records = rows
            .iter()
            .map(|&(c, d, clicks, spend, conversions)| Record {
                clicks: Some(clicks),
                spend: Some(spend),
                conversions: Some(conversions),
                ..Record::keyed(c, day(d))
            })
            .collect();
        RecordSet::new(
            SourceKind::Clicks,
            [Field::CampaignId, Field::Date, Field::Clicks, Field::Spend, Field::Conversions],
            records,
        )
    }

    fn weather(rows: &[(&str, u32, &str)]) -> RecordSet {
        let records = rows
            .iter()
            .map(|&(c, d, condition)| Record {
                weather: Some(WeatherContext {
                    condition: Some(condition.to_string()),
                    ..WeatherContext::default()
                }),
                ..Record::keyed(c, day(d))
            })
            .collect();
        RecordSet::new(SourceKind::Weather, [Field::CampaignId, Field::Date, Field::Weather], records)
    }

    #[test]
    fn joins_traffic_and_clicks_on_key() {
        let merged = merge(
            &traffic(&[("A", 1, 1000)]),
            &clicks(&[("A", 1, 50, 25.0, 0)]),
            None,
            &MergePolicy::default(),
        )
        .unwrap();

        assert_eq!(merged.len(), 1);
        let row = &merged.records[0];
        assert_eq!(row.campaign_id, "A");
        assert_eq!(row.impressions, 1000);
        assert_eq!(row.clicks, 50);
        assert!((row.spend - 25.0).abs() < 1e-12);
        assert!(row.weather.is_none());
    }

    #[test]
    fn every_key_appears_exactly_once() {
        let t = traffic(&[("A", 1, 10), ("A", 2, 20), ("B", 1, 5)]);
        let c = clicks(&[("A", 2, 1, 1.0, 0), ("C", 3, 2, 4.0, 1)]);
        let w = weather(&[("B", 1, "rain"), ("D", 4, "sun")]);

        let merged = merge(&t, &c, Some(&w), &MergePolicy::default()).unwrap();

        let keys: Vec<(String, NaiveDate)> = merged
            .records
            .iter()
            .map(|r| (r.campaign_id.clone(), r.date))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("A".to_string(), day(1)),
                ("A".to_string(), day(2)),
                ("B".to_string(), day(1)),
                ("C".to_string(), day(3)),
                ("D".to_string(), day(4)),
            ]
        );

        // Keys missing from a source are zero-filled, never dropped.
        let c_row = &merged.records[3];
        assert_eq!(c_row.impressions, 0);
        assert_eq!(c_row.clicks, 2);
        let d_row = &merged.records[4];
        assert_eq!((d_row.impressions, d_row.clicks, d_row.conversions), (0, 0, 0));
        assert_eq!(d_row.weather.as_ref().unwrap().condition.as_deref(), Some("sun"));
    }

    #[test]
    fn higher_precedence_source_wins_conflicts() {
        let mut t = traffic(&[("A", 1, 100)]);
        t.columns.insert(Field::Clicks);
        t.records[0].clicks = Some(10);
        let c = clicks(&[("A", 1, 50, 5.0, 1)]);

        let merged = merge(&t, &c, None, &MergePolicy::default()).unwrap();
        assert_eq!(merged.records[0].clicks, 10);

        let clicks_first = MergePolicy {
            precedence: vec![SourceKind::Clicks, SourceKind::Traffic, SourceKind::Weather],
            ..MergePolicy::default()
        };
        let merged = merge(&t, &c, None, &clicks_first).unwrap();
        assert_eq!(merged.records[0].clicks, 50);
    }

    #[test]
    fn reject_mode_fails_on_disagreement_only() {
        let mut t = traffic(&[("A", 1, 100)]);
        t.records[0].clicks = Some(50);
        let c = clicks(&[("A", 1, 50, 5.0, 1)]);
        let reject = MergePolicy {
            on_conflict: ConflictMode::Reject,
            ..MergePolicy::default()
        };

        // Same value in both sources is not a conflict.
        assert!(merge(&t, &c, None, &reject).is_ok());

        t.records[0].clicks = Some(49);
        let err = merge(&t, &c, None, &reject).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MergeConflict);
        assert!(err.message().contains("`clicks`"));
    }

    #[test]
    fn duplicate_key_within_source_is_conflict() {
        let t = traffic(&[("A", 1, 1), ("A", 1, 2)]);
        let err = merge(&t, &clicks(&[]), None, &MergePolicy::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MergeConflict);
    }

    #[test]
    fn missing_key_column_is_schema_error() {
        let mut t = traffic(&[("A", 1, 1)]);
        t.columns.remove(&Field::Date);
        let err = merge(&t, &clicks(&[]), None, &MergePolicy::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Schema);
    }

    #[test]
    fn negative_spend_is_type_error() {
        let c = clicks(&[("A", 1, 1, -2.0, 0)]);
        let err = merge(&traffic(&[]), &c, None, &MergePolicy::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Type);
        assert!(err.message().contains("`spend`"));
    }

    #[test]
    fn large_counts_survive_the_merge_exactly() {
        let big = 9_007_199_254_740_993;
        let merged = merge(
            &traffic(&[("A", 1, big)]),
            &clicks(&[("A", 1, big - 1, 1.0, 0)]),
            None,
            &MergePolicy::default(),
        )
        .unwrap();
        assert_eq!(merged.records[0].impressions, big);
        assert_eq!(merged.records[0].clicks, big - 1);
    }

    #[test]
    fn weather_is_omitted_or_carried_forward_per_policy() {
        let t = traffic(&[("A", 1, 1), ("A", 2, 1), ("B", 2, 1)]);
        let w = weather(&[("A", 1, "rain")]);

        let omitted = merge(&t, &clicks(&[]), Some(&w), &MergePolicy::default()).unwrap();
        assert!(omitted.records[1].weather.is_none());

        let carry = MergePolicy {
            context_fill: ContextFill::CarryForward,
            ..MergePolicy::default()
        };
        let carried = merge(&t, &clicks(&[]), Some(&w), &carry).unwrap();
        assert_eq!(
            carried.records[1].weather.as_ref().unwrap().condition.as_deref(),
            Some("rain")
        );
        // Never carried across campaigns.
        assert!(carried.records[2].weather.is_none());
    }
}
