//! The `measurements` table.
//!
//! One row per `(project_id, stage, object_id)`. Stage-specific columns
//! (`survey_group`, `survey_address`, `slope`) are null for the other stage.
//! Enum columns hold their short codes.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use duckdb::{Connection, Row};
use sidewalk_measurement_models::{
    Coordinate, HazardSize, LabeledChoice, MeasurementRecord, SpecialCase, Stage, StageDetails,
};

use crate::DbError;

/// Number of rows per INSERT chunk.
const CHUNK_SIZE: usize = 1_000;

/// Bound parameters per inserted row.
const COLUMNS_PER_ROW: usize = 22;

const SELECT_COLUMNS: &str = "stage, object_id, longitude, latitude, length, width, area,
    h1, h2, curb_length, measured_hazard_length, inch_feet, special_case,
    hazard_size, tech, note, geocoded_address, measured_at::TEXT,
    survey_group, survey_address, slope";

/// Creates the `measurements` table if it does not exist.
///
/// # Errors
///
/// Returns [`DbError`] if the DDL fails.
pub fn create_schema(conn: &Connection) -> Result<(), DbError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS measurements (
            project_id BIGINT NOT NULL,
            stage TEXT NOT NULL,
            object_id BIGINT NOT NULL,
            longitude DOUBLE NOT NULL,
            latitude DOUBLE NOT NULL,
            length DOUBLE NOT NULL DEFAULT 0,
            width DOUBLE NOT NULL DEFAULT 0,
            area DOUBLE NOT NULL DEFAULT 0,
            h1 DOUBLE NOT NULL DEFAULT 0,
            h2 DOUBLE NOT NULL DEFAULT 0,
            curb_length DOUBLE NOT NULL DEFAULT 0,
            measured_hazard_length DOUBLE NOT NULL DEFAULT 0,
            inch_feet DOUBLE NOT NULL DEFAULT 0,
            special_case TEXT,
            hazard_size TEXT,
            tech TEXT,
            note TEXT,
            geocoded_address TEXT,
            measured_at TIMESTAMP NOT NULL,
            survey_group TEXT,
            survey_address TEXT,
            slope TEXT,
            PRIMARY KEY (project_id, stage, object_id)
        );",
    )?;

    Ok(())
}

/// Keeps the last occurrence of each `object_id`, preserving order.
fn dedupe_last_wins(records: &[MeasurementRecord]) -> Vec<&MeasurementRecord> {
    let mut last_seen: BTreeMap<i64, usize> = BTreeMap::new();
    for (i, record) in records.iter().enumerate() {
        last_seen.insert(record.object_id, i);
    }

    let deduped: Vec<&MeasurementRecord> = records
        .iter()
        .enumerate()
        .filter(|(i, record)| last_seen.get(&record.object_id) == Some(i))
        .map(|(_, record)| record)
        .collect();

    if deduped.len() < records.len() {
        log::info!(
            "Deduplicated measurement batch: {} -> {} rows ({} duplicates removed)",
            records.len(),
            deduped.len(),
            records.len() - deduped.len(),
        );
    }

    deduped
}

/// Inserts records for a project stage. Duplicate `object_id`s within the
/// batch keep the last occurrence.
///
/// Does not open a transaction; see [`replace`] for the atomic variant.
///
/// # Errors
///
/// Returns [`DbError`] if any INSERT fails.
pub fn insert(
    conn: &Connection,
    project_id: i64,
    stage: Stage,
    records: &[MeasurementRecord],
) -> Result<u64, DbError> {
    if records.is_empty() {
        return Ok(0);
    }

    let mut total_inserted = 0u64;

    for chunk in dedupe_last_wins(records).chunks(CHUNK_SIZE) {
        let mut sql = String::from(
            "INSERT INTO measurements (
                project_id, stage, object_id, longitude, latitude, length,
                width, area, h1, h2, curb_length, measured_hazard_length,
                inch_feet, special_case, hazard_size, tech, note,
                geocoded_address, measured_at, survey_group, survey_address,
                slope
            ) VALUES ",
        );

        let placeholders = vec!["?"; COLUMNS_PER_ROW].join(", ");
        for i in 0..chunk.len() {
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push('(');
            sql.push_str(&placeholders);
            sql.push(')');
        }

        let mut stmt = conn.prepare(&sql)?;
        let mut param_idx = 1usize;

        for record in chunk {
            stmt.raw_bind_parameter(param_idx, project_id)?;
            stmt.raw_bind_parameter(param_idx + 1, stage.as_ref())?;
            stmt.raw_bind_parameter(param_idx + 2, record.object_id)?;
            stmt.raw_bind_parameter(param_idx + 3, record.coordinate.longitude)?;
            stmt.raw_bind_parameter(param_idx + 4, record.coordinate.latitude)?;
            stmt.raw_bind_parameter(param_idx + 5, record.length)?;
            stmt.raw_bind_parameter(param_idx + 6, record.width)?;
            stmt.raw_bind_parameter(param_idx + 7, record.area)?;
            stmt.raw_bind_parameter(param_idx + 8, record.h1)?;
            stmt.raw_bind_parameter(param_idx + 9, record.h2)?;
            stmt.raw_bind_parameter(param_idx + 10, record.curb_length)?;
            stmt.raw_bind_parameter(param_idx + 11, record.measured_hazard_length)?;
            stmt.raw_bind_parameter(param_idx + 12, record.inch_feet)?;
            stmt.raw_bind_parameter(param_idx + 13, record.special_case.map(LabeledChoice::code))?;
            stmt.raw_bind_parameter(param_idx + 14, record.hazard_size.map(LabeledChoice::code))?;
            stmt.raw_bind_parameter(param_idx + 15, record.tech.as_deref())?;
            stmt.raw_bind_parameter(param_idx + 16, record.note.as_deref())?;
            stmt.raw_bind_parameter(param_idx + 17, record.geocoded_address.as_deref())?;
            stmt.raw_bind_parameter(
                param_idx + 18,
                record.measured_at.format("%Y-%m-%d %H:%M:%S%.6f").to_string(),
            )?;
            stmt.raw_bind_parameter(param_idx + 19, record.survey_group())?;
            stmt.raw_bind_parameter(param_idx + 20, record.survey_address())?;
            stmt.raw_bind_parameter(param_idx + 21, record.slope())?;

            param_idx += COLUMNS_PER_ROW;
        }

        let rows = stmt.raw_execute()?;
        total_inserted += u64::try_from(rows).unwrap_or(0);
    }

    Ok(total_inserted)
}

/// Deletes the measurement set for a project stage.
///
/// # Errors
///
/// Returns [`DbError`] if the delete fails.
pub fn delete(conn: &Connection, project_id: i64, stage: Stage) -> Result<u64, DbError> {
    let rows = conn.execute(
        "DELETE FROM measurements WHERE project_id = ? AND stage = ?",
        duckdb::params![project_id, stage.as_ref()],
    )?;
    Ok(u64::try_from(rows).unwrap_or(0))
}

/// Runs `f` inside `BEGIN TRANSACTION` / `COMMIT`, rolling back on error.
///
/// # Errors
///
/// Returns the error from `f`, or [`DbError`] if the transaction cannot be
/// opened or committed.
pub fn in_transaction<T>(
    conn: &Connection,
    f: impl FnOnce(&Connection) -> Result<T, DbError>,
) -> Result<T, DbError> {
    conn.execute_batch("BEGIN TRANSACTION")?;

    match f(conn) {
        Ok(value) => {
            conn.execute_batch("COMMIT")?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback) = conn.execute_batch("ROLLBACK") {
                log::error!("Failed to roll back transaction: {rollback}");
            }
            Err(e)
        }
    }
}

/// Atomically deletes the existing set and inserts `records` in its place.
///
/// # Errors
///
/// Returns [`DbError`] if any statement fails. The transaction is rolled
/// back and the previous set is left intact.
pub fn replace(
    conn: &Connection,
    project_id: i64,
    stage: Stage,
    records: &[MeasurementRecord],
) -> Result<u64, DbError> {
    in_transaction(conn, |conn| {
        let deleted = delete(conn, project_id, stage)?;
        let inserted = insert(conn, project_id, stage, records)?;
        log::debug!(
            "Replaced project {project_id} {stage} measurements: {deleted} -> {inserted} rows"
        );
        Ok(inserted)
    })
}

/// Like [`replace`], then recomputes the project's estimated sidewalk miles
/// from the survey set inside the same transaction. Returns the rows stored
/// and the new estimate.
///
/// # Errors
///
/// Returns [`DbError`] if any statement fails. Neither the measurement set
/// nor the estimate changes.
pub fn replace_with_miles(
    conn: &Connection,
    project_id: i64,
    stage: Stage,
    records: &[MeasurementRecord],
    estimate: &dyn Fn(&[MeasurementRecord]) -> f64,
) -> Result<(u64, f64), DbError> {
    in_transaction(conn, |conn| {
        delete(conn, project_id, stage)?;
        let inserted = insert(conn, project_id, stage, records)?;
        let survey = find(conn, project_id, Stage::Survey)?;
        let miles = estimate(&survey);
        crate::projects::set_estimated_miles(conn, project_id, miles)?;
        log::debug!(
            "Replaced project {project_id} {stage} measurements with {inserted} rows, {miles:.3} miles"
        );
        Ok((inserted, miles))
    })
}

/// Returns the measurement set for a project stage, ordered by
/// `object_id`.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails or a row cannot be decoded.
pub fn find(
    conn: &Connection,
    project_id: i64,
    stage: Stage,
) -> Result<Vec<MeasurementRecord>, DbError> {
    let sql = format!(
        "SELECT {SELECT_COLUMNS} FROM measurements
         WHERE project_id = ? AND stage = ?
         ORDER BY object_id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(duckdb::params![project_id, stage.as_ref()])?;

    let mut records = Vec::new();
    while let Some(row) = rows.next()? {
        records.push(read_record(row)?);
    }
    Ok(records)
}

/// Returns every `stage` measurement, across projects, measured on a
/// calendar day within `[start, end]`, ordered by time then `object_id`.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails or a row cannot be decoded.
pub fn find_in_range(
    conn: &Connection,
    stage: Stage,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<MeasurementRecord>, DbError> {
    let sql = format!(
        "SELECT {SELECT_COLUMNS} FROM measurements
         WHERE stage = ?
           AND CAST(measured_at AS DATE) BETWEEN CAST(? AS DATE) AND CAST(? AS DATE)
         ORDER BY measured_at, object_id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(duckdb::params![
        stage.as_ref(),
        start.format("%Y-%m-%d").to_string(),
        end.format("%Y-%m-%d").to_string(),
    ])?;

    let mut records = Vec::new();
    while let Some(row) = rows.next()? {
        records.push(read_record(row)?);
    }
    Ok(records)
}

/// Writes `geocoded_address` for each `(object_id, address)` pair inside a
/// single transaction.
///
/// # Errors
///
/// Returns [`DbError`] if any update fails.
pub fn update_geocoded_addresses(
    conn: &Connection,
    project_id: i64,
    stage: Stage,
    addresses: &[(i64, Option<String>)],
) -> Result<u64, DbError> {
    if addresses.is_empty() {
        return Ok(0);
    }

    in_transaction(conn, |conn| {
        let mut stmt = conn.prepare(
            "UPDATE measurements SET geocoded_address = ?
             WHERE project_id = ? AND stage = ? AND object_id = ?",
        )?;

        let mut updated = 0u64;
        for (object_id, address) in addresses {
            let rows = stmt.execute(duckdb::params![
                address.as_deref(),
                project_id,
                stage.as_ref(),
                object_id,
            ])?;
            updated += u64::try_from(rows).unwrap_or(0);
        }
        Ok(updated)
    })
}

fn conversion(message: String) -> DbError {
    DbError::Conversion { message }
}

fn read_record(row: &Row<'_>) -> Result<MeasurementRecord, DbError> {
    let stage_raw: String = row.get(0)?;
    let stage = stage_raw
        .parse::<Stage>()
        .map_err(|_| conversion(format!("unknown stage {stage_raw:?}")))?;

    let special_case = row
        .get::<_, Option<String>>(12)?
        .map(|code| {
            SpecialCase::from_code(&code)
                .ok_or_else(|| conversion(format!("unknown special case code {code:?}")))
        })
        .transpose()?;
    let hazard_size = row
        .get::<_, Option<String>>(13)?
        .map(|code| {
            HazardSize::from_code(&code)
                .ok_or_else(|| conversion(format!("unknown hazard size code {code:?}")))
        })
        .transpose()?;

    let measured_at_raw: String = row.get(17)?;
    let measured_at = parse_timestamp(&measured_at_raw)
        .ok_or_else(|| conversion(format!("unreadable timestamp {measured_at_raw:?}")))?;

    let details = match stage {
        Stage::Survey => StageDetails::Survey {
            survey_group: row.get::<_, Option<String>>(18)?.unwrap_or_default(),
            survey_address: row.get(19)?,
        },
        Stage::Production => StageDetails::Production {
            slope: row.get(20)?,
        },
    };

    Ok(MeasurementRecord {
        object_id: row.get(1)?,
        coordinate: Coordinate::new(row.get(2)?, row.get(3)?),
        length: row.get(4)?,
        width: row.get(5)?,
        area: row.get(6)?,
        h1: row.get(7)?,
        h2: row.get(8)?,
        curb_length: row.get(9)?,
        measured_hazard_length: row.get(10)?,
        inch_feet: row.get(11)?,
        special_case,
        hazard_size,
        tech: row.get(14)?,
        note: row.get(15)?,
        geocoded_address: row.get(16)?,
        measured_at,
        details,
    })
}

/// Parses a `DuckDB` `TIMESTAMP::TEXT` value into a UTC `DateTime`.
///
/// The text form omits the fraction when it is zero
/// (`2024-01-15 10:30:00`) and includes it otherwise
/// (`2024-01-15 10:30:00.123`).
pub(crate) fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%#z") {
        return Some(dt.with_timezone(&Utc));
    }

    log::warn!("Failed to parse timestamp: {s:?}");
    None
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone as _;

    use super::*;
    use crate::{measurements, projects};

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        projects::create_schema(&conn).unwrap();
        measurements::create_schema(&conn).unwrap();
        conn
    }

    fn survey(object_id: i64, group: &str) -> MeasurementRecord {
        MeasurementRecord {
            object_id,
            coordinate: Coordinate::new(-122.4194, 37.7749),
            length: 4.0,
            width: 2.0,
            area: 8.0,
            h1: 0.5,
            h2: 1.0,
            curb_length: 0.0,
            measured_hazard_length: 0.0,
            inch_feet: 2.5,
            special_case: Some(SpecialCase::Driveway),
            hazard_size: Some(HazardSize::Medium),
            tech: Some("jdoe".to_string()),
            note: None,
            geocoded_address: None,
            measured_at: Utc.with_ymd_and_hms(2024, 1, 15, 14, 30, 0).unwrap(),
            details: StageDetails::Survey {
                survey_group: group.to_string(),
                survey_address: Some("100 Elm St".to_string()),
            },
        }
    }

    #[test]
    fn replace_round_trips_records_in_object_id_order() {
        let conn = conn();
        let records = vec![survey(3, "Elm St"), survey(1, "Elm St"), survey(2, "Oak Ave")];

        assert_eq!(replace(&conn, 7, Stage::Survey, &records).unwrap(), 3);

        let stored = find(&conn, 7, Stage::Survey).unwrap();
        let ids: Vec<_> = stored.iter().map(|r| r.object_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(stored[1], records[2]);
    }

    #[test]
    fn replace_discards_previous_set() {
        let conn = conn();
        replace(&conn, 7, Stage::Survey, &[survey(1, "a"), survey(2, "a")]).unwrap();
        replace(&conn, 7, Stage::Survey, &[survey(9, "b")]).unwrap();

        let stored = find(&conn, 7, Stage::Survey).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].object_id, 9);
    }

    #[test]
    fn duplicate_object_ids_keep_last_row() {
        let conn = conn();
        let records = vec![survey(1, "first"), survey(1, "second")];
        assert_eq!(replace(&conn, 7, Stage::Survey, &records).unwrap(), 1);

        let stored = find(&conn, 7, Stage::Survey).unwrap();
        assert_eq!(stored[0].survey_group(), Some("second"));
    }

    #[test]
    fn stages_and_projects_are_isolated() {
        let conn = conn();
        replace(&conn, 7, Stage::Survey, &[survey(1, "a")]).unwrap();
        replace(&conn, 8, Stage::Survey, &[survey(1, "a")]).unwrap();

        assert_eq!(delete(&conn, 7, Stage::Survey).unwrap(), 1);
        assert!(find(&conn, 7, Stage::Survey).unwrap().is_empty());
        assert_eq!(find(&conn, 8, Stage::Survey).unwrap().len(), 1);
        assert!(find(&conn, 8, Stage::Production).unwrap().is_empty());
    }

    #[test]
    fn failed_transaction_rolls_back() {
        let conn = conn();
        replace(&conn, 7, Stage::Survey, &[survey(1, "a")]).unwrap();

        let result: Result<(), DbError> = in_transaction(&conn, |conn| {
            delete(conn, 7, Stage::Survey)?;
            Err(conversion("boom".to_string()))
        });
        assert!(result.is_err());
        assert_eq!(find(&conn, 7, Stage::Survey).unwrap().len(), 1);
    }

    #[test]
    fn replace_with_miles_estimates_from_committed_survey() {
        let conn = conn();
        let (inserted, miles) = replace_with_miles(
            &conn,
            7,
            Stage::Survey,
            &[survey(1, "a"), survey(1, "a"), survey(2, "a")],
            &|survey| if survey.len() == 2 { 1.5 } else { 0.0 },
        )
        .unwrap();

        assert_eq!(inserted, 2);
        assert!((miles - 1.5).abs() < f64::EPSILON);
        assert_eq!(projects::get_estimated_miles(&conn, 7).unwrap(), Some(1.5));
    }

    #[test]
    fn failed_miles_write_rolls_back_replace() {
        let conn = conn();
        replace(&conn, 7, Stage::Survey, &[survey(1, "a")]).unwrap();
        conn.execute_batch("DROP TABLE pricing_sheets").unwrap();

        let result = replace_with_miles(
            &conn,
            7,
            Stage::Survey,
            &[survey(5, "b"), survey(6, "b")],
            &|_| 1.0,
        );

        assert!(result.is_err());
        let ids: Vec<_> = find(&conn, 7, Stage::Survey)
            .unwrap()
            .iter()
            .map(|r| r.object_id)
            .collect();
        assert_eq!(ids, vec![1]);
    }

    #[test]
    fn range_query_filters_by_calendar_date() {
        let conn = conn();
        let mut early = survey(1, "a");
        early.details = StageDetails::Production { slope: None };
        let mut late = early.clone();
        late.object_id = 2;
        late.measured_at = Utc.with_ymd_and_hms(2024, 1, 20, 23, 59, 0).unwrap();
        replace(&conn, 7, Stage::Production, &[early, late]).unwrap();

        let day = |d| NaiveDate::from_ymd_opt(2024, 1, d).unwrap();
        assert_eq!(
            find_in_range(&conn, Stage::Production, day(15), day(19)).unwrap().len(),
            1
        );
        assert_eq!(
            find_in_range(&conn, Stage::Production, day(15), day(20)).unwrap().len(),
            2
        );
        assert!(find_in_range(&conn, Stage::Survey, day(15), day(20)).unwrap().is_empty());
    }

    #[test]
    fn geocoded_addresses_are_written_by_object_id() {
        let conn = conn();
        replace(&conn, 7, Stage::Survey, &[survey(1, "a"), survey(2, "a")]).unwrap();

        let updated = update_geocoded_addresses(
            &conn,
            7,
            Stage::Survey,
            &[(2, Some("12 Main Street".to_string())), (99, None)],
        )
        .unwrap();
        assert_eq!(updated, 1);

        let stored = find(&conn, 7, Stage::Survey).unwrap();
        assert_eq!(stored[0].geocoded_address, None);
        assert_eq!(stored[1].geocoded_address.as_deref(), Some("12 Main Street"));
    }

    #[test]
    fn parses_duckdb_timestamp_text() {
        let dt = parse_timestamp("2024-01-15 10:30:00").unwrap();
        assert_eq!(dt.to_string(), "2024-01-15 10:30:00 UTC");
        let dt = parse_timestamp("2024-01-15 10:30:00.123").unwrap();
        assert_eq!(dt.timestamp_subsec_millis(), 123);
        assert!(parse_timestamp("not-a-date").is_none());
    }
}
