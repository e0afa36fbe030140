//! Column alias tables for the two measurement export shapes.
//!
//! The collection app labels its columns for humans (`"Curb Length
//! (feet)"`, `"Start Street - Area"`). Each [`Field`] knows its label, and
//! each [`Stage`] accepts a fixed set of fields and exports them in its own
//! order.

use sidewalk_measurement_models::Stage;

/// A canonical measurement field that can appear as a CSV column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    /// `OBJECTID`
    ObjectId,
    /// `Length`
    Length,
    /// `Width`
    Width,
    /// `SQFT`
    Area,
    /// `x`
    Longitude,
    /// `y`
    Latitude,
    /// `H1`
    H1,
    /// `H2`
    H2,
    /// `Curb Length (feet)`
    CurbLength,
    /// `Measured Hazard Length (inches)`
    MeasuredHazardLength,
    /// `Inch Feet`
    InchFeet,
    /// `Special Case`
    SpecialCase,
    /// `Hazard Size`
    HazardSize,
    /// `Creator`
    Tech,
    /// `Notes`
    Note,
    /// `CreationDate`
    MeasuredAt,
    /// `Address` (Survey only)
    SurveyAddress,
    /// `Start Street - Area` (Survey only)
    SurveyGroup,
    /// `Slope` (Production only)
    Slope,
}

impl Field {
    /// Returns the human-readable CSV column label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::ObjectId => "OBJECTID",
            Self::Length => "Length",
            Self::Width => "Width",
            Self::Area => "SQFT",
            Self::Longitude => "x",
            Self::Latitude => "y",
            Self::H1 => "H1",
            Self::H2 => "H2",
            Self::CurbLength => "Curb Length (feet)",
            Self::MeasuredHazardLength => "Measured Hazard Length (inches)",
            Self::InchFeet => "Inch Feet",
            Self::SpecialCase => "Special Case",
            Self::HazardSize => "Hazard Size",
            Self::Tech => "Creator",
            Self::Note => "Notes",
            Self::MeasuredAt => "CreationDate",
            Self::SurveyAddress => "Address",
            Self::SurveyGroup => "Start Street - Area",
            Self::Slope => "Slope",
        }
    }

    /// Looks up the field for a header label within a stage's schema.
    ///
    /// Labels outside the stage's schema (including the other stage's
    /// extension columns) return `None` and are ignored on import.
    #[must_use]
    pub fn from_label(stage: Stage, label: &str) -> Option<Self> {
        fields(stage)
            .iter()
            .copied()
            .find(|field| field.label() == label)
    }
}

/// Columns shared by both stages.
const BASE_FIELDS: [Field; 16] = [
    Field::ObjectId,
    Field::Length,
    Field::Width,
    Field::Area,
    Field::Longitude,
    Field::Latitude,
    Field::H1,
    Field::H2,
    Field::CurbLength,
    Field::MeasuredHazardLength,
    Field::InchFeet,
    Field::SpecialCase,
    Field::HazardSize,
    Field::Tech,
    Field::Note,
    Field::MeasuredAt,
];

const SURVEY_FIELDS: [Field; 18] = {
    let mut fields = [Field::SurveyAddress; 18];
    let mut i = 0;
    while i < BASE_FIELDS.len() {
        fields[i] = BASE_FIELDS[i];
        i += 1;
    }
    fields[16] = Field::SurveyAddress;
    fields[17] = Field::SurveyGroup;
    fields
};

const PRODUCTION_FIELDS: [Field; 17] = {
    let mut fields = [Field::Slope; 17];
    let mut i = 0;
    while i < BASE_FIELDS.len() {
        fields[i] = BASE_FIELDS[i];
        i += 1;
    }
    fields
};

/// Export column order for Survey files: identity and grouping first,
/// coordinates last.
const SURVEY_EXPORT_ORDER: [Field; 18] = [
    Field::ObjectId,
    Field::SurveyGroup,
    Field::Width,
    Field::Length,
    Field::Area,
    Field::HazardSize,
    Field::SpecialCase,
    Field::CurbLength,
    Field::Note,
    Field::SurveyAddress,
    Field::H1,
    Field::H2,
    Field::MeasuredHazardLength,
    Field::InchFeet,
    Field::MeasuredAt,
    Field::Tech,
    Field::Latitude,
    Field::Longitude,
];

/// Export column order for Production files: identity and work date
/// first, coordinates last.
const PRODUCTION_EXPORT_ORDER: [Field; 17] = [
    Field::ObjectId,
    Field::MeasuredAt,
    Field::Tech,
    Field::Width,
    Field::Length,
    Field::Area,
    Field::H1,
    Field::H2,
    Field::MeasuredHazardLength,
    Field::HazardSize,
    Field::Slope,
    Field::InchFeet,
    Field::SpecialCase,
    Field::CurbLength,
    Field::Note,
    Field::Latitude,
    Field::Longitude,
];

/// Returns every field accepted on import for `stage`.
#[must_use]
pub const fn fields(stage: Stage) -> &'static [Field] {
    match stage {
        Stage::Survey => &SURVEY_FIELDS,
        Stage::Production => &PRODUCTION_FIELDS,
    }
}

/// Returns the export column order for `stage`.
#[must_use]
pub const fn export_order(stage: Stage) -> &'static [Field] {
    match stage {
        Stage::Survey => &SURVEY_EXPORT_ORDER,
        Stage::Production => &PRODUCTION_EXPORT_ORDER,
    }
}
