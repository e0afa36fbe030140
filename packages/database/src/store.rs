//! [`MeasurementStore`] backed by a single `DuckDB` connection.

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, NaiveDate, Utc};
use duckdb::Connection;
use sidewalk_measurement_models::{HazardSummary, MeasurementRecord, Stage};

use crate::{DbError, LayerStatus, MeasurementStore, Project, measurements, projects};

/// A `DuckDB`-backed store.
///
/// `duckdb::Connection` is `Send` but not `Sync`, so the connection is
/// wrapped in a `Mutex`. Each trait call holds the lock for its whole
/// duration, so a replace is never interleaved with another call.
pub struct DuckDbStore {
    conn: Mutex<Connection>,
}

impl DuckDbStore {
    /// Opens (or creates) the database at `path` and ensures the schema
    /// exists.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the directory, connection, or schema cannot
    /// be created.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        if let Some(parent) = path.parent() {
            crate::paths::ensure_dir(parent)?;
        }

        log::debug!("Opening DuckDB store at {}", path.display());
        Self::from_connection(Connection::open(path)?)
    }

    /// Opens a transient in-memory database.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the connection or schema cannot be created.
    pub fn open_in_memory() -> Result<Self, DbError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, DbError> {
        projects::create_schema(&conn)?;
        measurements::create_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl MeasurementStore for DuckDbStore {
    fn find(&self, project_id: i64, stage: Stage) -> Result<Vec<MeasurementRecord>, DbError> {
        measurements::find(&self.conn(), project_id, stage)
    }

    fn find_in_range(
        &self,
        stage: Stage,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<MeasurementRecord>, DbError> {
        measurements::find_in_range(&self.conn(), stage, start, end)
    }

    fn replace_all(
        &self,
        project_id: i64,
        stage: Stage,
        records: &[MeasurementRecord],
    ) -> Result<u64, DbError> {
        measurements::replace(&self.conn(), project_id, stage, records)
    }

    fn replace_all_with_miles(
        &self,
        project_id: i64,
        stage: Stage,
        records: &[MeasurementRecord],
        estimate: &dyn Fn(&[MeasurementRecord]) -> f64,
    ) -> Result<(u64, f64), DbError> {
        measurements::replace_with_miles(&self.conn(), project_id, stage, records, estimate)
    }

    fn delete_all(&self, project_id: i64, stage: Stage) -> Result<u64, DbError> {
        measurements::delete(&self.conn(), project_id, stage)
    }

    fn upsert_project(&self, project: &Project) -> Result<(), DbError> {
        projects::upsert_project(&self.conn(), project)
    }

    fn project(&self, project_id: i64) -> Result<Option<Project>, DbError> {
        projects::get_project(&self.conn(), project_id)
    }

    fn estimated_sidewalk_miles(&self, project_id: i64) -> Result<Option<f64>, DbError> {
        projects::get_estimated_miles(&self.conn(), project_id)
    }

    fn set_estimated_sidewalk_miles(&self, project_id: i64, miles: f64) -> Result<(), DbError> {
        projects::set_estimated_miles(&self.conn(), project_id, miles)
    }

    fn hazards(&self, project_id: i64, stage: Stage) -> Result<Option<HazardSummary>, DbError> {
        projects::get_hazards(&self.conn(), project_id, stage)
    }

    fn set_hazards(
        &self,
        project_id: i64,
        stage: Stage,
        hazards: &HazardSummary,
    ) -> Result<(), DbError> {
        projects::set_hazards(&self.conn(), project_id, stage, hazards)
    }

    fn layer_status(&self, project_id: i64, stage: Stage) -> Result<Option<LayerStatus>, DbError> {
        projects::get_layer_status(&self.conn(), project_id, stage)
    }

    fn set_layer_synced(
        &self,
        project_id: i64,
        stage: Stage,
        synced_at: DateTime<Utc>,
    ) -> Result<(), DbError> {
        projects::set_layer_synced(&self.conn(), project_id, stage, synced_at)
    }

    fn mark_layer_not_synced(&self, project_id: i64, stage: Stage) -> Result<bool, DbError> {
        projects::mark_layer_not_synced(&self.conn(), project_id, stage)
    }

    fn update_geocoded_addresses(
        &self,
        project_id: i64,
        stage: Stage,
        addresses: &[(i64, Option<String>)],
    ) -> Result<u64, DbError> {
        measurements::update_geocoded_addresses(&self.conn(), project_id, stage, addresses)
    }
}
