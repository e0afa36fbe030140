#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Technician production report.
//!
//! [`get_production`] cross-tabulates production measurements into one row
//! per technician with a column for every calendar day in the window.
//! [`labeled_table`] renders those rows with display labels for the
//! dashboard table.
//!
//! The window is not bounded here; every day in it becomes a column, so
//! callers are expected to cap its length.

pub mod table;

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use sidewalk_measurement_models::{MeasurementRecord, TechProductionRow};

pub use table::{LabeledRow, labeled_table};

/// Every calendar day in `[start, end]`, in order. Empty if `start > end`.
pub fn days_in_range(start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    start.iter_days().take_while(move |day| *day <= end)
}

#[derive(Default)]
struct TechTally {
    records: u64,
    inch_feet: f64,
    days: BTreeSet<NaiveDate>,
    daily: BTreeMap<NaiveDate, f64>,
}

/// Builds one row per technician with at least one record in
/// `[start, end]`, sorted by technician.
///
/// When `techs` is non-empty only the named technicians are reported.
/// Records without a technician are skipped.
#[must_use]
pub fn get_production(
    records: &[MeasurementRecord],
    start: NaiveDate,
    end: NaiveDate,
    techs: &[String],
) -> Vec<TechProductionRow> {
    let mut tallies: BTreeMap<&str, TechTally> = BTreeMap::new();

    for record in records {
        let Some(tech) = record.tech.as_deref() else {
            continue;
        };
        if !techs.is_empty() && !techs.iter().any(|t| t == tech) {
            continue;
        }
        let day = record.work_date();
        if day < start || day > end {
            continue;
        }

        let tally = tallies.entry(tech).or_default();
        tally.records += 1;
        tally.inch_feet += record.inch_feet;
        tally.days.insert(day);
        *tally.daily.entry(day).or_insert(0.0) += record.inch_feet;
    }

    let rows: Vec<TechProductionRow> = tallies
        .into_iter()
        .map(|(tech, tally)| {
            let total_days = tally.days.len() as u64;
            #[allow(clippy::cast_precision_loss)]
            let average_per_day =
                (total_days > 0).then(|| tally.inch_feet / total_days as f64);
            let daily = days_in_range(start, end)
                .map(|day| (day, tally.daily.get(&day).copied().unwrap_or(0.0)))
                .collect();

            TechProductionRow {
                tech: tech.to_string(),
                total_records: tally.records,
                total_days,
                total_inch_feet: tally.inch_feet,
                average_per_day,
                daily,
            }
        })
        .collect();

    log::debug!(
        "Production report {start}..={end}: {} techs from {} records",
        rows.len(),
        records.len()
    );

    rows
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone as _, Utc};
    use sidewalk_measurement_models::{Coordinate, StageDetails};

    use super::*;

    fn record(tech: &str, day: u32, hour: u32, inch_feet: f64) -> MeasurementRecord {
        MeasurementRecord {
            object_id: i64::from(day * 100 + hour),
            coordinate: Coordinate::new(-122.4194, 37.7749),
            length: 0.0,
            width: 0.0,
            area: 0.0,
            h1: 0.0,
            h2: 0.0,
            curb_length: 0.0,
            measured_hazard_length: 0.0,
            inch_feet,
            special_case: None,
            hazard_size: None,
            tech: Some(tech.to_string()),
            note: None,
            geocoded_address: None,
            measured_at: Utc.with_ymd_and_hms(2024, 1, day, hour, 0, 0).unwrap(),
            details: StageDetails::Production { slope: None },
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    #[test]
    fn averages_over_distinct_days_worked() {
        let records = vec![
            record("jdoe", 15, 9, 10.0),
            record("jdoe", 15, 14, 15.0),
            record("jdoe", 16, 9, 20.0),
        ];
        let rows = get_production(&records, day(14), day(17), &[]);

        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.total_records, 3);
        assert_eq!(row.total_days, 2);
        assert!((row.total_inch_feet - 45.0).abs() < f64::EPSILON);
        assert_eq!(row.average_per_day, Some(22.5));

        let daily: Vec<_> = row.daily.iter().map(|(d, v)| (*d, *v)).collect();
        assert_eq!(
            daily,
            vec![(day(14), 0.0), (day(15), 25.0), (day(16), 20.0), (day(17), 0.0)]
        );
    }

    #[test]
    fn rows_sort_by_tech_and_respect_filter() {
        let records = vec![
            record("zed", 15, 9, 1.0),
            record("amy", 15, 9, 2.0),
            record("bob", 15, 9, 3.0),
        ];
        let all: Vec<_> = get_production(&records, day(15), day(15), &[])
            .into_iter()
            .map(|r| r.tech)
            .collect();
        assert_eq!(all, vec!["amy", "bob", "zed"]);

        let filtered = get_production(
            &records,
            day(15),
            day(15),
            &["zed".to_string(), "nobody".to_string()],
        );
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].tech, "zed");
    }

    #[test]
    fn window_is_inclusive_on_both_ends() {
        let records = vec![
            record("jdoe", 14, 23, 1.0),
            record("jdoe", 15, 0, 2.0),
            record("jdoe", 16, 23, 4.0),
            record("jdoe", 17, 0, 8.0),
        ];
        let rows = get_production(&records, day(15), day(16), &[]);
        assert!((rows[0].total_inch_feet - 6.0).abs() < f64::EPSILON);
        assert_eq!(rows[0].daily.len(), 2);
    }

    #[test]
    fn inverted_window_is_empty() {
        let records = vec![record("jdoe", 15, 9, 1.0)];
        assert!(get_production(&records, day(16), day(15), &[]).is_empty());
        assert_eq!(days_in_range(day(16), day(15)).count(), 0);
    }

    #[test]
    fn rows_serialize_with_iso_date_columns() {
        let rows = get_production(&[record("jdoe", 15, 9, 5.0)], day(15), day(15), &[]);
        let value = serde_json::to_value(&rows[0]).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "tech": "jdoe",
                "total_records": 1,
                "total_days": 1,
                "total_inch_feet": 5.0,
                "average_per_day": 5.0,
                "2024-01-15": 5.0,
            })
        );
    }
}
