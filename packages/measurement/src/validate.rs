//! Row validation and normalization.
//!
//! [`validate_row`] turns one raw row into a [`MeasurementRecord`].
//! [`validate_rows`] folds over a whole file, carrying the survey group
//! label forward across blank cells.

use std::collections::BTreeMap;

use sidewalk_measurement_models::{
    Coordinate, HazardSize, LabeledChoice, MeasurementRecord, SpecialCase, Stage, StageDetails,
};

use crate::parsing::{non_blank, parse_number, parse_timestamp};
use crate::schema::Field;
use crate::{ValidationError, ValidationErrorKind};

/// Survey group used until the first non-blank group label is seen.
pub const DEFAULT_SURVEY_GROUP: &str = "default";

/// One data row, keyed by field. Blank cells are never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRow {
    cells: BTreeMap<Field, String>,
}

impl RawRow {
    /// Creates an empty row.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a cell. Whitespace-only values are treated as absent.
    pub fn insert(&mut self, field: Field, value: &str) {
        match non_blank(value) {
            Some(value) => {
                self.cells.insert(field, value.to_string());
            }
            None => {
                self.cells.remove(&field);
            }
        }
    }

    /// Builder-style [`Self::insert`].
    #[must_use]
    pub fn with(mut self, field: Field, value: &str) -> Self {
        self.insert(field, value);
        self
    }

    /// Returns the trimmed cell, if present.
    #[must_use]
    pub fn get(&self, field: Field) -> Option<&str> {
        self.cells.get(&field).map(String::as_str)
    }
}

fn number(row: &RawRow, field: Field) -> Result<Option<f64>, ValidationErrorKind> {
    row.get(field)
        .map(|raw| {
            parse_number(raw).ok_or_else(|| ValidationErrorKind::InvalidNumber {
                column: field.label(),
                raw: raw.to_string(),
            })
        })
        .transpose()
}

fn measure(row: &RawRow, field: Field) -> Result<f64, ValidationErrorKind> {
    Ok(number(row, field)?.unwrap_or(0.0))
}

fn non_negative(row: &RawRow, field: Field) -> Result<f64, ValidationErrorKind> {
    let value = measure(row, field)?;
    if value < 0.0 {
        return Err(ValidationErrorKind::NegativeValue {
            column: field.label(),
            value: value.to_string(),
        });
    }
    Ok(value)
}

fn choice<T: LabeledChoice>(row: &RawRow, field: Field) -> Result<Option<T>, ValidationErrorKind> {
    row.get(field)
        .map(|raw| {
            T::from_label(raw).ok_or_else(|| ValidationErrorKind::InvalidEnumValue {
                field: T::FIELD,
                value: raw.to_string(),
            })
        })
        .transpose()
}

fn text(row: &RawRow, field: Field) -> Option<String> {
    row.get(field).map(str::to_string)
}

/// Validates a single row for `stage`.
///
/// `survey_group` is the already-resolved group label for Survey rows and
/// is ignored for Production rows.
///
/// # Errors
///
/// Returns the first [`ValidationErrorKind`] found in the row.
pub fn validate_row(
    row: &RawRow,
    stage: Stage,
    survey_group: &str,
) -> Result<MeasurementRecord, ValidationErrorKind> {
    let object_id_raw = row
        .get(Field::ObjectId)
        .ok_or(ValidationErrorKind::MissingField {
            column: Field::ObjectId.label(),
        })?;
    let object_id =
        object_id_raw
            .parse::<i64>()
            .map_err(|_| ValidationErrorKind::InvalidNumber {
                column: Field::ObjectId.label(),
                raw: object_id_raw.to_string(),
            })?;

    let longitude = row.get(Field::Longitude).and_then(parse_number);
    let latitude = row.get(Field::Latitude).and_then(parse_number);
    let (Some(longitude), Some(latitude)) = (longitude, latitude) else {
        return Err(ValidationErrorKind::MissingCoordinate);
    };

    let length = non_negative(row, Field::Length)?;
    let width = non_negative(row, Field::Width)?;
    let h1 = non_negative(row, Field::H1)?;
    let h2 = non_negative(row, Field::H2)?;
    let curb_length = non_negative(row, Field::CurbLength)?;
    let measured_hazard_length = measure(row, Field::MeasuredHazardLength)?;
    let inch_feet = measure(row, Field::InchFeet)?;
    let area = number(row, Field::Area)?;

    let special_case = choice::<SpecialCase>(row, Field::SpecialCase)?;
    let hazard_size = choice::<HazardSize>(row, Field::HazardSize)?;

    let tech = text(row, Field::Tech);
    if stage == Stage::Production && tech.is_none() {
        return Err(ValidationErrorKind::MissingField {
            column: Field::Tech.label(),
        });
    }

    let raw_date = row.get(Field::MeasuredAt).unwrap_or_default();
    let measured_at =
        parse_timestamp(raw_date).ok_or_else(|| ValidationErrorKind::InvalidTimestamp {
            raw: raw_date.to_string(),
        })?;

    let details = match stage {
        Stage::Survey => StageDetails::Survey {
            survey_group: survey_group.to_string(),
            survey_address: text(row, Field::SurveyAddress),
        },
        Stage::Production => StageDetails::Production {
            slope: text(row, Field::Slope),
        },
    };

    let mut record = MeasurementRecord {
        object_id,
        coordinate: Coordinate::new(longitude, latitude),
        length,
        width,
        area: 0.0,
        h1,
        h2,
        curb_length,
        measured_hazard_length,
        inch_feet,
        special_case,
        hazard_size,
        tech,
        note: text(row, Field::Note),
        geocoded_address: None,
        measured_at,
        details,
    };
    record.apply_special_case_rules();
    record.area = area.unwrap_or_else(|| record.square_feet());

    Ok(record)
}

/// Running state for [`validate_rows`].
struct FillDown {
    group: String,
    records: Vec<MeasurementRecord>,
}

/// Validates every row in file order, stopping at the first failure.
///
/// Survey rows with a blank `Start Street - Area` inherit the most recent
/// non-blank label (or [`DEFAULT_SURVEY_GROUP`] before any is seen).
///
/// # Errors
///
/// Returns a [`ValidationError`] carrying the 1-based row number of the
/// first invalid row.
pub fn validate_rows<I>(rows: I, stage: Stage) -> Result<Vec<MeasurementRecord>, ValidationError>
where
    I: IntoIterator<Item = RawRow>,
{
    let initial = FillDown {
        group: DEFAULT_SURVEY_GROUP.to_string(),
        records: Vec::new(),
    };

    let filled = rows
        .into_iter()
        .enumerate()
        .try_fold(initial, |mut acc, (index, row)| {
            if let Some(group) = row.get(Field::SurveyGroup) {
                group.clone_into(&mut acc.group);
            }
            let record = validate_row(&row, stage, &acc.group)
                .map_err(|kind| ValidationError {
                    row: index + 1,
                    kind,
                })?;
            acc.records.push(record);
            Ok(acc)
        })?;

    log::debug!(
        "Validated {} {} rows",
        filled.records.len(),
        stage.label()
    );

    Ok(filled.records)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn survey_row(object_id: &str) -> RawRow {
        RawRow::new()
            .with(Field::ObjectId, object_id)
            .with(Field::Longitude, "-122.4194")
            .with(Field::Latitude, "37.7749")
            .with(Field::MeasuredAt, "2024-01-15 14:30:00")
    }

    fn production_row(object_id: &str) -> RawRow {
        survey_row(object_id).with(Field::Tech, "jdoe")
    }

    #[test]
    fn blank_cells_are_absent() {
        let row = RawRow::new().with(Field::Note, "   ");
        assert_eq!(row.get(Field::Note), None);
    }

    #[test]
    fn optional_measures_default_to_zero() {
        let record = validate_row(&survey_row("7"), Stage::Survey, "Elm St").unwrap();
        assert_eq!(record.object_id, 7);
        assert!(record.length.abs() < f64::EPSILON);
        assert!(record.area.abs() < f64::EPSILON);
        assert_eq!(record.survey_group(), Some("Elm St"));
        assert_eq!(record.special_case, None);
    }

    #[test]
    fn area_falls_back_to_length_times_width() {
        let row = survey_row("1")
            .with(Field::Length, "4")
            .with(Field::Width, "2");
        let record = validate_row(&row, Stage::Survey, "default").unwrap();
        assert!((record.area - 8.0).abs() < f64::EPSILON);

        let row = row.with(Field::Area, "9.5");
        let record = validate_row(&row, Stage::Survey, "default").unwrap();
        assert!((record.area - 9.5).abs() < f64::EPSILON);
    }

    #[test]
    fn production_curb_is_normalized() {
        let row = production_row("1")
            .with(Field::SpecialCase, "curb")
            .with(Field::CurbLength, "10")
            .with(Field::MeasuredHazardLength, "3")
            .with(Field::Length, "6");
        let record = validate_row(&row, Stage::Production, "").unwrap();
        assert!((record.measured_hazard_length - 120.0).abs() < f64::EPSILON);
        assert!((record.length - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn missing_coordinate_is_rejected() {
        let row = survey_row("1").with(Field::Latitude, "");
        assert_eq!(
            validate_row(&row, Stage::Survey, "default"),
            Err(ValidationErrorKind::MissingCoordinate)
        );
    }

    #[test]
    fn unknown_special_case_is_rejected() {
        let row = survey_row("1").with(Field::SpecialCase, "Sinkhole");
        assert_eq!(
            validate_row(&row, Stage::Survey, "default"),
            Err(ValidationErrorKind::InvalidEnumValue {
                field: "special_case",
                value: "Sinkhole".to_string(),
            })
        );
    }

    #[test]
    fn unknown_hazard_size_is_rejected() {
        let row = survey_row("1").with(Field::HazardSize, "Huge");
        assert_eq!(
            validate_row(&row, Stage::Survey, "default"),
            Err(ValidationErrorKind::InvalidEnumValue {
                field: "hazard_size",
                value: "Huge".to_string(),
            })
        );
    }

    #[test]
    fn negative_measure_is_rejected() {
        let row = survey_row("1").with(Field::Width, "-2");
        assert!(matches!(
            validate_row(&row, Stage::Survey, "default"),
            Err(ValidationErrorKind::NegativeValue { column: "Width", .. })
        ));
    }

    #[test]
    fn production_requires_tech() {
        assert_eq!(
            validate_row(&survey_row("1"), Stage::Production, ""),
            Err(ValidationErrorKind::MissingField { column: "Creator" })
        );
    }

    #[test]
    fn survey_group_fills_down() {
        let rows = vec![
            survey_row("1"),
            survey_row("2").with(Field::SurveyGroup, "Elm St"),
            survey_row("3"),
            survey_row("4"),
            survey_row("5").with(Field::SurveyGroup, "Oak Ave"),
            survey_row("6"),
        ];
        let records = validate_rows(rows, Stage::Survey).unwrap();
        let groups: Vec<_> = records.iter().filter_map(|r| r.survey_group()).collect();
        assert_eq!(
            groups,
            vec!["default", "Elm St", "Elm St", "Elm St", "Oak Ave", "Oak Ave"]
        );
    }

    #[test]
    fn first_bad_row_aborts_with_its_number() {
        let rows = vec![
            production_row("1"),
            production_row("2"),
            production_row("3").with(Field::MeasuredAt, ""),
            production_row("4").with(Field::MeasuredAt, "garbage"),
        ];
        let err = validate_rows(rows, Stage::Production).unwrap_err();
        assert_eq!(err.row, 3);
        assert_eq!(
            err.kind,
            ValidationErrorKind::InvalidTimestamp { raw: String::new() }
        );
    }
}
