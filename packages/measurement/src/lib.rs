#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Validation and CSV import/export for field-survey measurement exports.
//!
//! Raw CSV exports are mapped from their human-readable column labels to
//! [`schema::Field`]s, validated row by row into canonical
//! [`MeasurementRecord`](sidewalk_measurement_models::MeasurementRecord)s,
//! and can be written back out in a fixed column order per
//! [`Stage`](sidewalk_measurement_models::Stage). Imports are
//! all-or-nothing: the first bad row aborts the whole parse.

pub mod csv_codec;
pub mod parsing;
pub mod schema;
pub mod validate;

pub use csv_codec::{parse, serialize};

/// Why a single row was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationErrorKind {
    /// Longitude (`x`) or latitude (`y`) is missing or not a number.
    #[error("longitude and latitude must both be present and numeric")]
    MissingCoordinate,

    /// `CreationDate` is missing or could not be parsed.
    #[error("invalid timestamp {raw:?}")]
    InvalidTimestamp {
        /// The raw cell value (empty when the cell was blank).
        raw: String,
    },

    /// An enum cell did not match any known label.
    #[error("invalid {field}: {value:?}")]
    InvalidEnumValue {
        /// Internal field name (`special_case` or `hazard_size`).
        field: &'static str,
        /// The unmatched cell value.
        value: String,
    },

    /// A numeric cell could not be parsed.
    #[error("column {column:?} is not a number: {raw:?}")]
    InvalidNumber {
        /// Column label.
        column: &'static str,
        /// The raw cell value.
        raw: String,
    },

    /// A measure that must be non-negative was negative.
    #[error("column {column:?} must not be negative: {value}")]
    NegativeValue {
        /// Column label.
        column: &'static str,
        /// The parsed value.
        value: String,
    },

    /// A required cell was blank.
    #[error("column {column:?} is required")]
    MissingField {
        /// Column label.
        column: &'static str,
    },
}

/// A rejected row, with its 1-based position among the data rows.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("row {row}: {kind}")]
pub struct ValidationError {
    /// 1-based data row number (the header is not counted).
    pub row: usize,
    /// What was wrong with the row.
    pub kind: ValidationErrorKind,
}

/// Errors from reading or writing measurement CSV files.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The input was not UTF-8 after stripping a byte-order mark.
    #[error("CSV is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),

    /// The delimited text itself was malformed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Writing the output buffer failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A row failed validation.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}
