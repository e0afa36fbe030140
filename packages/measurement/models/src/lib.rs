#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Canonical measurement types shared across the sidewalk pipeline.
//!
//! Field surveys arrive as CSV exports from a GIS data-collection app in one
//! of two shapes, selected by [`Stage`]. Both normalize into a single
//! [`MeasurementRecord`] whose stage-specific fields live in
//! [`StageDetails`]. Hazard aggregates, report rows, and the geocoding job
//! payload are defined here as well so every package speaks the same types.

use std::collections::BTreeMap;
use std::ops::{Add, AddAssign};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Processing phase of a project.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum Stage {
    /// Initial assessment of sidewalk hazards.
    Survey,
    /// Post-repair verification of completed work.
    Production,
}

impl Stage {
    /// Returns the human-readable label for this stage.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Survey => "Survey",
            Self::Production => "Production",
        }
    }

    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Survey, Self::Production]
    }
}

/// How a project is priced.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum PricingModel {
    /// Priced by inch-feet of repaired hazard.
    #[default]
    InchFoot,
    /// Priced by square footage, which needs an estimate of sidewalk miles.
    SquareFoot,
}

/// An enum imported from CSV by its display label and stored by its code.
pub trait LabeledChoice: Sized + Copy + 'static {
    /// Field name used in validation messages.
    const FIELD: &'static str;

    /// Returns all variants in declaration order.
    fn all() -> &'static [Self];

    /// Returns the stored short code (e.g. `"C"`).
    fn code(self) -> &'static str;

    /// Returns the display label (e.g. `"Curb"`).
    fn label(self) -> &'static str;

    /// Case-insensitive lookup by display label.
    #[must_use]
    fn from_label(raw: &str) -> Option<Self> {
        Self::all()
            .iter()
            .copied()
            .find(|choice| choice.label().eq_ignore_ascii_case(raw))
    }

    /// Exact lookup by stored code.
    #[must_use]
    fn from_code(code: &str) -> Option<Self> {
        Self::all()
            .iter()
            .copied()
            .find(|choice| choice.code() == code)
    }
}

/// Categorical defect/feature tag that overrides standard hazard rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SpecialCase {
    /// Driveway aprons.
    #[serde(rename = "AP")]
    Aprons,
    /// Asphalt patch.
    #[serde(rename = "AS")]
    Asphalt,
    /// Bottom of a handicap ramp.
    #[serde(rename = "BHC")]
    BottomHc,
    /// Curb-to-building.
    #[serde(rename = "C2B")]
    C2b,
    /// Catch basin.
    #[serde(rename = "CB")]
    CatchBasin,
    /// Curb; measured by curb length rather than hazard length.
    #[serde(rename = "C")]
    Curb,
    /// Driveway.
    #[serde(rename = "D")]
    Driveway,
    /// Gutter pan.
    #[serde(rename = "GP")]
    GutterPan,
    /// Leadwalk.
    #[serde(rename = "L")]
    Leadwalk,
    /// Utility meters.
    #[serde(rename = "ME")]
    Meters,
    /// Hazard missed during an earlier pass.
    #[serde(rename = "MI")]
    Missed,
    /// Panel must be replaced.
    #[serde(rename = "R")]
    Replace,
    /// Sidewalk-to-curb.
    #[serde(rename = "SW2C")]
    Sw2c,
}

impl LabeledChoice for SpecialCase {
    const FIELD: &'static str = "special_case";

    fn all() -> &'static [Self] {
        &[
            Self::Aprons,
            Self::Asphalt,
            Self::BottomHc,
            Self::C2b,
            Self::CatchBasin,
            Self::Curb,
            Self::Driveway,
            Self::GutterPan,
            Self::Leadwalk,
            Self::Meters,
            Self::Missed,
            Self::Replace,
            Self::Sw2c,
        ]
    }

    fn code(self) -> &'static str {
        match self {
            Self::Aprons => "AP",
            Self::Asphalt => "AS",
            Self::BottomHc => "BHC",
            Self::C2b => "C2B",
            Self::CatchBasin => "CB",
            Self::Curb => "C",
            Self::Driveway => "D",
            Self::GutterPan => "GP",
            Self::Leadwalk => "L",
            Self::Meters => "ME",
            Self::Missed => "MI",
            Self::Replace => "R",
            Self::Sw2c => "SW2C",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Aprons => "Aprons",
            Self::Asphalt => "Asphalt",
            Self::BottomHc => "Bottom HC",
            Self::C2b => "C2B",
            Self::CatchBasin => "Catch Basin",
            Self::Curb => "Curb",
            Self::Driveway => "Driveway",
            Self::GutterPan => "Gutter Pan",
            Self::Leadwalk => "Leadwalk",
            Self::Meters => "Meters",
            Self::Missed => "Missed",
            Self::Replace => "Replace",
            Self::Sw2c => "SW2C",
        }
    }
}

/// Quick size description recorded for a hazard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum HazardSize {
    /// Small hazard.
    #[serde(rename = "S")]
    Small,
    /// Medium hazard.
    #[serde(rename = "M")]
    Medium,
    /// Large hazard.
    #[serde(rename = "L")]
    Large,
}

impl LabeledChoice for HazardSize {
    const FIELD: &'static str = "hazard_size";

    fn all() -> &'static [Self] {
        &[Self::Small, Self::Medium, Self::Large]
    }

    fn code(self) -> &'static str {
        match self {
            Self::Small => "S",
            Self::Medium => "M",
            Self::Large => "L",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Small => "Small",
            Self::Medium => "Medium",
            Self::Large => "Large",
        }
    }
}

/// Severity classification of a sidewalk defect.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
pub enum HazardTier {
    /// Least severe hazards, recorded as [`HazardSize::Small`].
    #[serde(rename = "LS")]
    #[strum(serialize = "LS")]
    LeastSevere,
    /// Severe hazards, recorded as [`HazardSize::Medium`].
    #[serde(rename = "S")]
    #[strum(serialize = "S")]
    Severe,
    /// Most severe hazards, recorded as [`HazardSize::Large`].
    #[serde(rename = "MS")]
    #[strum(serialize = "MS")]
    MostSevere,
}

impl HazardTier {
    /// Returns the hazard size recorded in the field for this tier.
    #[must_use]
    pub const fn size(self) -> HazardSize {
        match self {
            Self::LeastSevere => HazardSize::Small,
            Self::Severe => HazardSize::Medium,
            Self::MostSevere => HazardSize::Large,
        }
    }

    /// Returns the human-readable label for this tier.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::LeastSevere => "Least Severe",
            Self::Severe => "Severe",
            Self::MostSevere => "Most Severe",
        }
    }

    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::LeastSevere, Self::Severe, Self::MostSevere]
    }
}

/// A WGS84 point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coordinate {
    /// Longitude in degrees.
    pub longitude: f64,
    /// Latitude in degrees.
    pub latitude: f64,
}

impl Coordinate {
    /// Creates a coordinate from a longitude/latitude pair.
    #[must_use]
    pub const fn new(longitude: f64, latitude: f64) -> Self {
        Self {
            longitude,
            latitude,
        }
    }
}

/// Fields that exist for only one [`Stage`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "stage",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum StageDetails {
    /// Survey-only fields.
    Survey {
        /// Street/area label used to bucket records for documents. Always
        /// populated after import (blank rows inherit the previous label).
        survey_group: String,
        /// Address typed by the surveyor.
        survey_address: Option<String>,
    },
    /// Production-only fields.
    Production {
        /// Free-text slope note.
        slope: Option<String>,
    },
}

impl StageDetails {
    /// Returns the stage these details belong to.
    #[must_use]
    pub const fn stage(&self) -> Stage {
        match self {
            Self::Survey { .. } => Stage::Survey,
            Self::Production { .. } => Stage::Production,
        }
    }
}

/// Length recorded for a curb repair at the production stage, in feet.
pub const PRODUCTION_CURB_LENGTH: f64 = 0.5;

/// A normalized field measurement.
///
/// Numeric measures default to `0.0` when the source cell was blank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasurementRecord {
    /// Per-feature identifier from the collection app. Unique within a
    /// project and stage.
    pub object_id: i64,
    /// Where the measurement was taken.
    pub coordinate: Coordinate,
    /// Hazard length in feet.
    pub length: f64,
    /// Hazard width in feet.
    pub width: f64,
    /// Length × width in square feet.
    pub area: f64,
    /// First hazard height in inches.
    pub h1: f64,
    /// Second hazard height in inches.
    pub h2: f64,
    /// Curb length in feet.
    pub curb_length: f64,
    /// Measured hazard length in inches.
    pub measured_hazard_length: f64,
    /// Severity-weighted linear measure used for pricing.
    pub inch_feet: f64,
    /// Special case tag, if any.
    pub special_case: Option<SpecialCase>,
    /// Quick size description, if any.
    pub hazard_size: Option<HazardSize>,
    /// Creator of the feature in the collection app.
    pub tech: Option<String>,
    /// Free-text note.
    pub note: Option<String>,
    /// Address resolved by reverse geocoding after import.
    pub geocoded_address: Option<String>,
    /// When the feature was created (UTC).
    pub measured_at: DateTime<Utc>,
    /// Stage-specific fields.
    pub details: StageDetails,
}

impl MeasurementRecord {
    /// Returns the stage this record belongs to.
    #[must_use]
    pub const fn stage(&self) -> Stage {
        self.details.stage()
    }

    /// Returns the survey group label (Survey records only).
    #[must_use]
    pub fn survey_group(&self) -> Option<&str> {
        match &self.details {
            StageDetails::Survey { survey_group, .. } => Some(survey_group),
            StageDetails::Production { .. } => None,
        }
    }

    /// Returns the surveyor-entered address (Survey records only).
    #[must_use]
    pub fn survey_address(&self) -> Option<&str> {
        match &self.details {
            StageDetails::Survey { survey_address, .. } => survey_address.as_deref(),
            StageDetails::Production { .. } => None,
        }
    }

    /// Returns the slope note (Production records only).
    #[must_use]
    pub fn slope(&self) -> Option<&str> {
        match &self.details {
            StageDetails::Production { slope } => slope.as_deref(),
            StageDetails::Survey { .. } => None,
        }
    }

    /// Whether this record is tagged as a curb.
    #[must_use]
    pub fn is_curb(&self) -> bool {
        self.special_case == Some(SpecialCase::Curb)
    }

    /// Returns `length × width`.
    #[must_use]
    pub fn square_feet(&self) -> f64 {
        self.length * self.width
    }

    /// Calendar date (UTC) the record was measured on.
    #[must_use]
    pub fn work_date(&self) -> NaiveDate {
        self.measured_at.date_naive()
    }

    /// Applies the curb overrides: the hazard length is always derived from
    /// the curb length, and production curbs are recorded at a fixed length.
    pub fn apply_special_case_rules(&mut self) {
        if !self.is_curb() {
            return;
        }

        self.measured_hazard_length = self.curb_length * 12.0;

        if self.stage() == Stage::Production {
            self.length = PRODUCTION_CURB_LENGTH;
        }
    }
}

/// Count and measures for one hazard tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HazardTotals {
    /// Number of hazards.
    pub count: u64,
    /// Sum of inch-feet.
    pub inch_feet: f64,
    /// Sum of `length × width`.
    pub square_feet: f64,
}

impl Add for HazardTotals {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            count: self.count + rhs.count,
            inch_feet: self.inch_feet + rhs.inch_feet,
            square_feet: self.square_feet + rhs.square_feet,
        }
    }
}

impl AddAssign for HazardTotals {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

/// Key of the synthetic column-wise sum in a [`HazardSummary`].
pub const TOTALS_KEY: &str = "TOTALS";

/// Hazard counts keyed by tier code (`LS`, `S`, `MS`) plus [`TOTALS_KEY`].
///
/// Persisted as a JSON object on the production instruction. Operators may
/// edit it freely once populated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HazardSummary(pub BTreeMap<String, HazardTotals>);

impl HazardSummary {
    /// Returns the totals recorded for `tier`.
    #[must_use]
    pub fn tier(&self, tier: HazardTier) -> Option<&HazardTotals> {
        self.0.get(tier.as_ref())
    }

    /// Returns the synthetic totals entry.
    #[must_use]
    pub fn totals(&self) -> Option<&HazardTotals> {
        self.0.get(TOTALS_KEY)
    }

    /// Whether no tier has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Bucket key for the grouped document listing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GroupKey {
    /// Survey records grouped by street/area label.
    SurveyGroup(String),
    /// Production records grouped by calendar work date.
    WorkDate(NaiveDate),
}

/// One bucket of the grouped document listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasurementGroup {
    /// The bucket key.
    pub key: GroupKey,
    /// Records in document order.
    pub records: Vec<MeasurementRecord>,
}

/// One technician's output over a reporting window.
///
/// Daily columns serialize as `YYYY-MM-DD` keys next to the totals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TechProductionRow {
    /// Technician identifier.
    pub tech: String,
    /// Number of records in the window.
    pub total_records: u64,
    /// Distinct calendar dates with at least one record.
    pub total_days: u64,
    /// Sum of inch-feet in the window.
    pub total_inch_feet: f64,
    /// `total_inch_feet / total_days`, or `None` when no days were worked.
    pub average_per_day: Option<f64>,
    /// Inch-feet per calendar day, one entry for every day in the window.
    #[serde(flatten)]
    pub daily: BTreeMap<NaiveDate, f64>,
}

/// Downstream job names understood by the job consumer.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobName {
    /// Reverse-geocode every measurement of a project stage.
    Geocoding,
}

/// Payload identifying the measurement set a job operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobPayload {
    /// Project primary key.
    pub project_id: i64,
    /// Stage of the measurement set.
    pub stage: Stage,
}

/// A fire-and-forget request for downstream work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRequest {
    /// Which job to run.
    pub job_name: JobName,
    /// What to run it on.
    pub payload: JobPayload,
}

impl JobRequest {
    /// Builds the reverse-geocoding request sent after every import.
    #[must_use]
    pub const fn geocoding(project_id: i64, stage: Stage) -> Self {
        Self {
            job_name: JobName::Geocoding,
            payload: JobPayload { project_id, stage },
        }
    }
}
