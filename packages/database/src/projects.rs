//! Project-level tables: `projects`, `pricing_sheets`, `instructions`, and
//! `project_layers`.

use chrono::{DateTime, Utc};
use duckdb::{Connection, OptionalExt as _};
use sidewalk_measurement_models::{HazardSummary, PricingModel, Stage};

use crate::measurements::parse_timestamp;
use crate::{DbError, LayerStatus, Project};

/// Creates the project-level tables if they do not exist.
///
/// # Errors
///
/// Returns [`DbError`] if the DDL fails.
pub fn create_schema(conn: &Connection) -> Result<(), DbError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS projects (
            id BIGINT PRIMARY KEY,
            name TEXT NOT NULL,
            pricing_model TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS pricing_sheets (
            project_id BIGINT PRIMARY KEY,
            estimated_sidewalk_miles DOUBLE
        );

        CREATE TABLE IF NOT EXISTS instructions (
            project_id BIGINT NOT NULL,
            stage TEXT NOT NULL,
            hazards TEXT,
            PRIMARY KEY (project_id, stage)
        );

        CREATE TABLE IF NOT EXISTS project_layers (
            project_id BIGINT NOT NULL,
            stage TEXT NOT NULL,
            synced BOOLEAN NOT NULL DEFAULT FALSE,
            last_synced_at TIMESTAMP,
            PRIMARY KEY (project_id, stage)
        );",
    )?;

    Ok(())
}

/// Inserts or updates a project.
///
/// # Errors
///
/// Returns [`DbError`] if the upsert fails.
pub fn upsert_project(conn: &Connection, project: &Project) -> Result<(), DbError> {
    conn.execute(
        "INSERT INTO projects (id, name, pricing_model) VALUES (?, ?, ?)
         ON CONFLICT (id) DO UPDATE SET
            name = EXCLUDED.name,
            pricing_model = EXCLUDED.pricing_model",
        duckdb::params![project.id, project.name, project.pricing_model.as_ref()],
    )?;
    Ok(())
}

/// Looks up a project by id.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails or the stored pricing model is
/// unknown.
pub fn get_project(conn: &Connection, project_id: i64) -> Result<Option<Project>, DbError> {
    let mut stmt = conn.prepare("SELECT name, pricing_model FROM projects WHERE id = ?")?;
    let row: Option<(String, String)> = stmt
        .query_row([project_id], |row| Ok((row.get(0)?, row.get(1)?)))
        .optional()?;

    row.map(|(name, pricing_model)| {
        let pricing_model =
            pricing_model
                .parse::<PricingModel>()
                .map_err(|_| DbError::Conversion {
                    message: format!("unknown pricing model {pricing_model:?}"),
                })?;
        Ok(Project {
            id: project_id,
            name,
            pricing_model,
        })
    })
    .transpose()
}

/// Returns the pricing sheet's estimated sidewalk miles, if computed.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub fn get_estimated_miles(conn: &Connection, project_id: i64) -> Result<Option<f64>, DbError> {
    let mut stmt =
        conn.prepare("SELECT estimated_sidewalk_miles FROM pricing_sheets WHERE project_id = ?")?;
    let miles: Option<Option<f64>> = stmt
        .query_row([project_id], |row| row.get(0))
        .optional()?;
    Ok(miles.flatten())
}

/// Stores the pricing sheet's estimated sidewalk miles.
///
/// # Errors
///
/// Returns [`DbError`] if the upsert fails.
pub fn set_estimated_miles(conn: &Connection, project_id: i64, miles: f64) -> Result<(), DbError> {
    conn.execute(
        "INSERT INTO pricing_sheets (project_id, estimated_sidewalk_miles) VALUES (?, ?)
         ON CONFLICT (project_id) DO UPDATE SET
            estimated_sidewalk_miles = EXCLUDED.estimated_sidewalk_miles",
        duckdb::params![project_id, miles],
    )?;
    Ok(())
}

/// Returns the hazard summary stored on a stage's instruction.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails or the JSON is malformed.
pub fn get_hazards(
    conn: &Connection,
    project_id: i64,
    stage: Stage,
) -> Result<Option<HazardSummary>, DbError> {
    let mut stmt =
        conn.prepare("SELECT hazards FROM instructions WHERE project_id = ? AND stage = ?")?;
    let raw: Option<Option<String>> = stmt
        .query_row(duckdb::params![project_id, stage.as_ref()], |row| {
            row.get(0)
        })
        .optional()?;

    match raw.flatten() {
        Some(json) => Ok(Some(serde_json::from_str(&json)?)),
        None => Ok(None),
    }
}

/// Stores the hazard summary on a stage's instruction, creating the
/// instruction if needed.
///
/// # Errors
///
/// Returns [`DbError`] if serialization or the upsert fails.
pub fn set_hazards(
    conn: &Connection,
    project_id: i64,
    stage: Stage,
    hazards: &HazardSummary,
) -> Result<(), DbError> {
    let json = serde_json::to_string(hazards)?;
    conn.execute(
        "INSERT INTO instructions (project_id, stage, hazards) VALUES (?, ?, ?)
         ON CONFLICT (project_id, stage) DO UPDATE SET hazards = EXCLUDED.hazards",
        duckdb::params![project_id, stage.as_ref(), json],
    )?;
    Ok(())
}

/// Returns the sync status of a stage layer, if one exists.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub fn get_layer_status(
    conn: &Connection,
    project_id: i64,
    stage: Stage,
) -> Result<Option<LayerStatus>, DbError> {
    let mut stmt = conn.prepare(
        "SELECT synced, last_synced_at::TEXT FROM project_layers
         WHERE project_id = ? AND stage = ?",
    )?;
    let row: Option<(bool, Option<String>)> = stmt
        .query_row(duckdb::params![project_id, stage.as_ref()], |row| {
            Ok((row.get(0)?, row.get(1)?))
        })
        .optional()?;

    Ok(row.map(|(synced, last_synced_at)| LayerStatus {
        synced,
        last_synced_at: last_synced_at.as_deref().and_then(parse_timestamp),
    }))
}

/// Records that a stage layer was synced.
///
/// # Errors
///
/// Returns [`DbError`] if the upsert fails.
pub fn set_layer_synced(
    conn: &Connection,
    project_id: i64,
    stage: Stage,
    synced_at: DateTime<Utc>,
) -> Result<(), DbError> {
    conn.execute(
        "INSERT INTO project_layers (project_id, stage, synced, last_synced_at)
         VALUES (?, ?, TRUE, ?)
         ON CONFLICT (project_id, stage) DO UPDATE SET
            synced = EXCLUDED.synced,
            last_synced_at = EXCLUDED.last_synced_at",
        duckdb::params![
            project_id,
            stage.as_ref(),
            synced_at.format("%Y-%m-%d %H:%M:%S%.6f").to_string(),
        ],
    )?;
    Ok(())
}

/// Marks an existing stage layer as not synced. Returns `false` when the
/// project has no layer for `stage`.
///
/// # Errors
///
/// Returns [`DbError`] if the update fails.
pub fn mark_layer_not_synced(
    conn: &Connection,
    project_id: i64,
    stage: Stage,
) -> Result<bool, DbError> {
    let rows = conn.execute(
        "UPDATE project_layers SET synced = FALSE WHERE project_id = ? AND stage = ?",
        duckdb::params![project_id, stage.as_ref()],
    )?;
    Ok(rows > 0)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone as _;
    use sidewalk_measurement_models::HazardTotals;

    use super::*;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        create_schema(&conn).unwrap();
        conn
    }

    #[test]
    fn project_upsert_overwrites() {
        let conn = conn();
        let mut project = Project {
            id: 1,
            name: "Downtown".to_string(),
            pricing_model: PricingModel::InchFoot,
        };
        upsert_project(&conn, &project).unwrap();
        project.pricing_model = PricingModel::SquareFoot;
        upsert_project(&conn, &project).unwrap();

        assert_eq!(get_project(&conn, 1).unwrap(), Some(project));
        assert_eq!(get_project(&conn, 2).unwrap(), None);
    }

    #[test]
    fn estimated_miles_round_trip() {
        let conn = conn();
        assert_eq!(get_estimated_miles(&conn, 1).unwrap(), None);
        set_estimated_miles(&conn, 1, 0.25).unwrap();
        set_estimated_miles(&conn, 1, 0.88).unwrap();
        assert_eq!(get_estimated_miles(&conn, 1).unwrap(), Some(0.88));
    }

    #[test]
    fn hazards_are_stored_as_json() {
        let conn = conn();
        assert!(get_hazards(&conn, 1, Stage::Production).unwrap().is_none());

        let mut hazards = HazardSummary::default();
        hazards.0.insert(
            "MS".to_string(),
            HazardTotals {
                count: 3,
                inch_feet: 4.5,
                square_feet: 12.0,
            },
        );
        set_hazards(&conn, 1, Stage::Production, &hazards).unwrap();

        assert_eq!(
            get_hazards(&conn, 1, Stage::Production).unwrap(),
            Some(hazards)
        );
        assert!(get_hazards(&conn, 1, Stage::Survey).unwrap().is_none());
    }

    #[test]
    fn layers_track_sync_status() {
        let conn = conn();
        assert!(!mark_layer_not_synced(&conn, 1, Stage::Survey).unwrap());

        let synced_at = Utc.with_ymd_and_hms(2024, 1, 15, 8, 0, 0).unwrap();
        set_layer_synced(&conn, 1, Stage::Survey, synced_at).unwrap();
        assert_eq!(
            get_layer_status(&conn, 1, Stage::Survey).unwrap(),
            Some(LayerStatus {
                synced: true,
                last_synced_at: Some(synced_at),
            })
        );

        assert!(mark_layer_not_synced(&conn, 1, Stage::Survey).unwrap());
        let status = get_layer_status(&conn, 1, Stage::Survey).unwrap().unwrap();
        assert!(!status.synced);
        assert_eq!(status.last_synced_at, Some(synced_at));
    }
}
