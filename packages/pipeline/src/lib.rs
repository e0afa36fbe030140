#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Measurement import pipeline.
//!
//! [`Pipeline`] is the surface the surrounding app calls: CSV import and
//! export, clearing a measurement set, hazard defaults, estimated miles,
//! and the technician production report. An import validates the whole
//! file before touching storage, replaces the stored set and (for
//! square-foot projects) the estimated sidewalk miles in one transaction,
//! and finally publishes a reverse-geocoding job.

pub mod dispatch;

use chrono::NaiveDate;
use sidewalk_database::{DbError, MeasurementStore};
use sidewalk_measurement::{CodecError, ValidationError};
use sidewalk_measurement_models::{
    HazardSummary, JobRequest, MeasurementGroup, MeasurementRecord, PricingModel, Stage,
    TechProductionRow,
};
use sidewalk_report::LabeledRow;

pub use dispatch::{DispatchError, JobDispatcher, NoopDispatcher, QueueDispatcher};

/// Default cap on the number of days in a production report window.
pub const DEFAULT_MAX_RANGE_DAYS: u32 = 100;

/// Errors returned by pipeline operations.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// A CSV row failed validation. Nothing was written.
    #[error("Validation error: {0}")]
    Validation(ValidationError),

    /// The CSV could not be read or written.
    #[error("CSV error: {0}")]
    Codec(CodecError),

    /// A storage operation failed. Nothing was committed.
    #[error("Storage error: {0}")]
    Storage(#[from] DbError),

    /// The report window is inverted or too long.
    #[error("Invalid date range {start}..={end} (at most {max_days} days)")]
    InvalidDateRange {
        /// First day of the window.
        start: NaiveDate,
        /// Last day of the window.
        end: NaiveDate,
        /// Longest allowed window.
        max_days: u32,
    },
}

impl From<CodecError> for PipelineError {
    fn from(e: CodecError) -> Self {
        match e {
            CodecError::Validation(e) => Self::Validation(e),
            other => Self::Codec(other),
        }
    }
}

/// A non-fatal problem reported alongside a successful operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineWarning {
    /// A downstream job could not be published. The import itself
    /// succeeded.
    #[error("Failed to dispatch {job_name} job for project {project_id}: {reason}")]
    JobDispatchFailure {
        /// The job that was not published.
        job_name: String,
        /// Project the job was for.
        project_id: i64,
        /// Why publishing failed.
        reason: String,
    },
}

/// Outcome of a successful import.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportSummary {
    /// Number of records now stored for the project stage.
    pub replaced: u64,
    /// Estimated sidewalk miles, when the project is priced by square foot.
    pub estimated_miles: Option<f64>,
    /// Non-fatal problems.
    pub warnings: Vec<PipelineWarning>,
}

/// The measurement pipeline over a store and a job dispatcher.
pub struct Pipeline<S, D> {
    store: S,
    dispatcher: D,
    max_range_days: u32,
}

impl<S: MeasurementStore, D: JobDispatcher> Pipeline<S, D> {
    /// Creates a pipeline with the default report window cap.
    pub const fn new(store: S, dispatcher: D) -> Self {
        Self {
            store,
            dispatcher,
            max_range_days: DEFAULT_MAX_RANGE_DAYS,
        }
    }

    /// Overrides the report window cap.
    #[must_use]
    pub const fn with_max_range_days(mut self, max_range_days: u32) -> Self {
        self.max_range_days = max_range_days;
        self
    }

    /// The underlying store.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Replaces a project stage's measurement set with the contents of a
    /// CSV export.
    ///
    /// The whole file is validated first; on any error the stored set is
    /// left untouched. Square-foot projects get their estimated sidewalk
    /// miles recomputed from the survey set in the same transaction as the
    /// replace. Once that commits a reverse-geocoding job is published; a
    /// failed publish is returned as a warning.
    ///
    /// # Errors
    ///
    /// * [`PipelineError::Validation`] for the first invalid row
    /// * [`PipelineError::Codec`] if the bytes are not readable CSV
    /// * [`PipelineError::Storage`] if the replace or miles update fails;
    ///   neither is committed
    pub fn import_csv(
        &self,
        bytes: &[u8],
        project_id: i64,
        stage: Stage,
    ) -> Result<ImportSummary, PipelineError> {
        let records = sidewalk_measurement::parse(bytes, stage)?;

        let (replaced, estimated_miles) = match self.pricing_model(project_id)? {
            PricingModel::SquareFoot => {
                let (replaced, miles) = self.store.replace_all_with_miles(
                    project_id,
                    stage,
                    &records,
                    &sidewalk_aggregate::estimated_sidewalk_miles,
                )?;
                log::info!("Project {project_id} estimated sidewalk miles: {miles:.3}");
                (replaced, Some(miles))
            }
            PricingModel::InchFoot => (self.store.replace_all(project_id, stage, &records)?, None),
        };
        log::info!("Imported {replaced} {stage} measurements for project {project_id}");

        let warnings = self
            .dispatch(&JobRequest::geocoding(project_id, stage))
            .into_iter()
            .collect();

        Ok(ImportSummary {
            replaced,
            estimated_miles,
            warnings,
        })
    }

    fn pricing_model(&self, project_id: i64) -> Result<PricingModel, PipelineError> {
        Ok(self
            .store
            .project(project_id)?
            .map(|project| project.pricing_model)
            .unwrap_or_default())
    }

    fn dispatch(&self, job: &JobRequest) -> Option<PipelineWarning> {
        match self.dispatcher.dispatch(job) {
            Ok(()) => None,
            Err(e) => {
                log::warn!(
                    "Failed to dispatch {} job for project {}: {e}",
                    job.job_name,
                    job.payload.project_id
                );
                Some(PipelineWarning::JobDispatchFailure {
                    job_name: job.job_name.to_string(),
                    project_id: job.payload.project_id,
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Exports a project stage's measurement set as CSV, ordered by
    /// `object_id`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if the read or encoding fails.
    pub fn export_csv(&self, project_id: i64, stage: Stage) -> Result<Vec<u8>, PipelineError> {
        let records = self.store.find(project_id, stage)?;
        Ok(sidewalk_measurement::serialize(&records, stage)?)
    }

    /// Deletes a project stage's measurement set and marks its map layer
    /// as not synced. Returns the number of records removed.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Storage`] if either write fails.
    pub fn clear(&self, project_id: i64, stage: Stage) -> Result<u64, PipelineError> {
        let deleted = self.store.delete_all(project_id, stage)?;
        if self.store.mark_layer_not_synced(project_id, stage)? {
            log::debug!("Marked project {project_id} {stage} layer as not synced");
        }
        log::info!("Cleared {deleted} {stage} measurements for project {project_id}");
        Ok(deleted)
    }

    /// Returns the production instruction's hazard summary.
    ///
    /// When none is stored yet, defaults are computed once from the survey
    /// set and persisted. Stored summaries, including operator edits, are
    /// returned as-is and never recomputed.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Storage`] if a read or write fails.
    pub fn get_hazard_defaults(&self, project_id: i64) -> Result<HazardSummary, PipelineError> {
        if let Some(stored) = self.store.hazards(project_id, Stage::Production)?
            && !stored.is_empty()
        {
            return Ok(stored);
        }

        let survey = self.store.find(project_id, Stage::Survey)?;
        let defaults = sidewalk_aggregate::hazard_totals(&survey);
        self.store
            .set_hazards(project_id, Stage::Production, &defaults)?;
        log::info!(
            "Populated default hazards for project {project_id} from {} survey records",
            survey.len()
        );

        Ok(defaults)
    }

    /// Stores an operator-edited hazard summary on the production
    /// instruction.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Storage`] if the write fails.
    pub fn set_hazards(&self, project_id: i64, hazards: &HazardSummary) -> Result<(), PipelineError> {
        self.store
            .set_hazards(project_id, Stage::Production, hazards)?;
        Ok(())
    }

    /// Returns the last computed estimated sidewalk miles.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Storage`] if the read fails.
    pub fn get_estimated_miles(&self, project_id: i64) -> Result<Option<f64>, PipelineError> {
        Ok(self.store.estimated_sidewalk_miles(project_id)?)
    }

    fn check_range(&self, start: NaiveDate, end: NaiveDate) -> Result<(), PipelineError> {
        let days = (end - start).num_days() + 1;
        if days < 1 || days > i64::from(self.max_range_days) {
            return Err(PipelineError::InvalidDateRange {
                start,
                end,
                max_days: self.max_range_days,
            });
        }
        Ok(())
    }

    /// Builds the technician production report over production
    /// measurements in `[start, end]`.
    ///
    /// # Errors
    ///
    /// * [`PipelineError::InvalidDateRange`] if `start > end` or the window
    ///   is longer than the configured cap
    /// * [`PipelineError::Storage`] if the read fails
    pub fn get_tech_production(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        techs: &[String],
    ) -> Result<Vec<TechProductionRow>, PipelineError> {
        self.check_range(start, end)?;
        let records = self.store.find_in_range(Stage::Production, start, end)?;
        Ok(sidewalk_report::get_production(&records, start, end, techs))
    }

    /// [`Self::get_tech_production`] rendered with display labels.
    ///
    /// # Errors
    ///
    /// Same as [`Self::get_tech_production`].
    pub fn get_tech_production_table(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        techs: &[String],
    ) -> Result<Vec<LabeledRow>, PipelineError> {
        let rows = self.get_tech_production(start, end, techs)?;
        Ok(sidewalk_report::labeled_table(&rows))
    }

    /// Returns a project stage's measurement set ordered by `object_id`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Storage`] if the read fails.
    pub fn list_measurements(
        &self,
        project_id: i64,
        stage: Stage,
    ) -> Result<Vec<MeasurementRecord>, PipelineError> {
        Ok(self.store.find(project_id, stage)?)
    }

    /// Returns a project stage's measurement set bucketed for documents.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Storage`] if the read fails.
    pub fn grouped_measurements(
        &self,
        project_id: i64,
        stage: Stage,
    ) -> Result<Vec<MeasurementGroup>, PipelineError> {
        let records = self.store.find(project_id, stage)?;
        Ok(sidewalk_aggregate::group_measurements(&records))
    }

    /// Returns the date of the earliest survey measurement.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Storage`] if the read fails.
    pub fn survey_date(&self, project_id: i64) -> Result<Option<NaiveDate>, PipelineError> {
        Ok(self
            .store
            .find(project_id, Stage::Survey)?
            .iter()
            .map(|record| record.measured_at)
            .min()
            .map(|measured_at| measured_at.date_naive()))
    }
}
