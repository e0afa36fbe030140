#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! `DuckDB` storage for the sidewalk pipeline.
//!
//! All persistent state lives in a single `DuckDB` file: projects and their
//! pricing sheets, per-stage instructions (hazard summaries), sync-status
//! layers, and the measurement sets themselves. Callers go through the
//! [`MeasurementStore`] trait so the pipeline can be exercised against a
//! failing or in-memory store.

pub mod measurements;
pub mod paths;
pub mod projects;
pub mod store;

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Error as JsonError;
use sidewalk_measurement_models::{HazardSummary, MeasurementRecord, PricingModel, Stage};

pub use store::DuckDbStore;

/// Errors that can occur during database operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// `DuckDB` query or transaction error.
    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),

    /// Filesystem error while preparing the data directory.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored hazard JSON could not be read or written.
    #[error("JSON error: {0}")]
    Json(#[from] JsonError),

    /// A stored value could not be converted back into a domain type.
    #[error("Data conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },
}

/// A customer project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    /// Primary key.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// How the project is priced.
    pub pricing_model: PricingModel,
}

/// Sync status of a project's map layer for one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerStatus {
    /// Whether the layer reflects the stored measurement set.
    pub synced: bool,
    /// When the layer was last synced, if ever.
    pub last_synced_at: Option<DateTime<Utc>>,
}

/// Persistence operations the pipeline depends on.
///
/// Every method is a single committed operation. [`Self::replace_all`] is
/// the only bulk write and runs inside one transaction.
pub trait MeasurementStore: Send + Sync {
    /// Returns the measurement set for a project stage, ordered by
    /// `object_id`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails.
    fn find(&self, project_id: i64, stage: Stage) -> Result<Vec<MeasurementRecord>, DbError>;

    /// Returns every measurement of `stage`, across all projects, whose
    /// calendar date falls within `[start, end]`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails.
    fn find_in_range(
        &self,
        stage: Stage,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<MeasurementRecord>, DbError>;

    /// Atomically replaces the measurement set for a project stage.
    ///
    /// Duplicate `object_id`s keep the last occurrence. Returns the number
    /// of rows stored.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if any statement fails; the previous set is
    /// left intact.
    fn replace_all(
        &self,
        project_id: i64,
        stage: Stage,
        records: &[MeasurementRecord],
    ) -> Result<u64, DbError>;

    /// [`Self::replace_all`] followed by recomputing the project's
    /// estimated sidewalk miles with `estimate` over the resulting survey
    /// set, committed together. Returns the rows stored and the estimate.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if any statement fails; neither the previous set
    /// nor the previous estimate changes.
    fn replace_all_with_miles(
        &self,
        project_id: i64,
        stage: Stage,
        records: &[MeasurementRecord],
        estimate: &dyn Fn(&[MeasurementRecord]) -> f64,
    ) -> Result<(u64, f64), DbError>;

    /// Deletes the measurement set for a project stage. Returns the number
    /// of rows removed.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the delete fails.
    fn delete_all(&self, project_id: i64, stage: Stage) -> Result<u64, DbError>;

    /// Inserts or updates a project.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the upsert fails.
    fn upsert_project(&self, project: &Project) -> Result<(), DbError>;

    /// Looks up a project.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails.
    fn project(&self, project_id: i64) -> Result<Option<Project>, DbError>;

    /// Returns the pricing sheet's estimated sidewalk miles, if computed.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails.
    fn estimated_sidewalk_miles(&self, project_id: i64) -> Result<Option<f64>, DbError>;

    /// Stores the pricing sheet's estimated sidewalk miles.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the upsert fails.
    fn set_estimated_sidewalk_miles(&self, project_id: i64, miles: f64) -> Result<(), DbError>;

    /// Returns the stored hazard summary of a stage's instruction.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails or the JSON is malformed.
    fn hazards(&self, project_id: i64, stage: Stage) -> Result<Option<HazardSummary>, DbError>;

    /// Stores the hazard summary of a stage's instruction.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the upsert fails.
    fn set_hazards(
        &self,
        project_id: i64,
        stage: Stage,
        hazards: &HazardSummary,
    ) -> Result<(), DbError>;

    /// Returns the sync status of a project's stage layer, if one exists.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails.
    fn layer_status(&self, project_id: i64, stage: Stage) -> Result<Option<LayerStatus>, DbError>;

    /// Records that a stage layer was synced at `synced_at`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the upsert fails.
    fn set_layer_synced(
        &self,
        project_id: i64,
        stage: Stage,
        synced_at: DateTime<Utc>,
    ) -> Result<(), DbError>;

    /// Marks an existing stage layer as not synced. Returns `false` if no
    /// layer exists.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the update fails.
    fn mark_layer_not_synced(&self, project_id: i64, stage: Stage) -> Result<bool, DbError>;

    /// Writes reverse-geocoded addresses keyed by `object_id`. Returns the
    /// number of rows updated.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if any update fails; no address is written.
    fn update_geocoded_addresses(
        &self,
        project_id: i64,
        stage: Stage,
        addresses: &[(i64, Option<String>)],
    ) -> Result<u64, DbError>;
}
