//! CSV reading and writing for measurement exports.

use chrono::SecondsFormat;
use sidewalk_measurement_models::{LabeledChoice as _, MeasurementRecord, Stage};

use crate::CodecError;
use crate::schema::{Field, export_order};
use crate::validate::{RawRow, validate_rows};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Parses a CSV export into validated records, in file order.
///
/// Columns are matched by their human-readable label; columns that do not
/// belong to `stage` are ignored. A header-only file yields no records.
///
/// # Errors
///
/// * [`CodecError::Encoding`] if the bytes are not UTF-8
/// * [`CodecError::Csv`] if the delimited text is malformed
/// * [`CodecError::Validation`] for the first row that fails validation
pub fn parse(bytes: &[u8], stage: Stage) -> Result<Vec<MeasurementRecord>, CodecError> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    let text = std::str::from_utf8(bytes)?;

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());

    let columns: Vec<Option<Field>> = reader
        .headers()?
        .iter()
        .map(|h| Field::from_label(stage, h.trim()))
        .collect();

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        let mut row = RawRow::new();
        for (column, value) in columns.iter().zip(record.iter()) {
            if let Some(field) = column {
                row.insert(*field, value);
            }
        }
        rows.push(row);
    }

    log::debug!("Read {} {} rows from CSV", rows.len(), stage.label());

    Ok(validate_rows(rows, stage)?)
}

fn cell(record: &MeasurementRecord, field: Field) -> String {
    match field {
        Field::ObjectId => record.object_id.to_string(),
        Field::Length => record.length.to_string(),
        Field::Width => record.width.to_string(),
        Field::Area => record.area.to_string(),
        Field::Longitude => record.coordinate.longitude.to_string(),
        Field::Latitude => record.coordinate.latitude.to_string(),
        Field::H1 => record.h1.to_string(),
        Field::H2 => record.h2.to_string(),
        Field::CurbLength => record.curb_length.to_string(),
        Field::MeasuredHazardLength => record.measured_hazard_length.to_string(),
        Field::InchFeet => record.inch_feet.to_string(),
        Field::SpecialCase => record
            .special_case
            .map(|choice| choice.label().to_string())
            .unwrap_or_default(),
        Field::HazardSize => record
            .hazard_size
            .map(|choice| choice.label().to_string())
            .unwrap_or_default(),
        Field::Tech => record.tech.clone().unwrap_or_default(),
        Field::Note => record.note.clone().unwrap_or_default(),
        Field::MeasuredAt => record
            .measured_at
            .to_rfc3339_opts(SecondsFormat::AutoSi, true),
        Field::SurveyAddress => record.survey_address().unwrap_or_default().to_string(),
        Field::SurveyGroup => record.survey_group().unwrap_or_default().to_string(),
        Field::Slope => record.slope().unwrap_or_default().to_string(),
    }
}

/// Writes records as CSV with the stage's column labels and export order.
///
/// Enum columns are written as display labels, timestamps as RFC 3339.
///
/// # Errors
///
/// * [`CodecError::Csv`] if a record cannot be written
/// * [`CodecError::Io`] if the output buffer cannot be flushed
pub fn serialize(records: &[MeasurementRecord], stage: Stage) -> Result<Vec<u8>, CodecError> {
    let order = export_order(stage);
    let mut writer = csv::Writer::from_writer(Vec::new());

    writer.write_record(order.iter().map(|field| field.label()))?;
    for record in records {
        writer.write_record(order.iter().map(|field| cell(record, *field)))?;
    }

    writer.into_inner().map_err(|e| CodecError::Io(e.into_error()))
}

#[cfg(test)]
mod tests {
    use sidewalk_measurement_models::SpecialCase;

    use super::*;
    use crate::{ValidationError, ValidationErrorKind};

    const SURVEY_CSV: &str = "\
OBJECTID,Length,Width,SQFT,x,y,H1,H2,Curb Length (feet),Measured Hazard Length (inches),Inch Feet,Special Case,Hazard Size,Creator,Notes,Address,CreationDate,Start Street - Area
1,4,2,,-122.4194,37.7749,0.5,1,,,2.5,,Small,jdoe,,100 Elm St,1705329000000,Elm St
2,3,3,,-122.4190,37.7750,,,,,,,Medium,jdoe,cracked,,1705329060000,
3,0,0,,-122.4185,37.7751,,,10,99,,Curb,,jdoe,,,1705329120000,
4,2,2,,-122.4180,37.7752,,,,,1.25,,Large,asmith,,,2024-01-16,Oak Ave
";

    #[test]
    fn parses_survey_export_with_fill_down() {
        let records = parse(SURVEY_CSV.as_bytes(), Stage::Survey).unwrap();
        assert_eq!(records.len(), 4);

        let groups: Vec<_> = records.iter().filter_map(|r| r.survey_group()).collect();
        assert_eq!(groups, vec!["Elm St", "Elm St", "Elm St", "Oak Ave"]);

        assert_eq!(records[0].survey_address(), Some("100 Elm St"));
        assert!((records[0].area - 8.0).abs() < f64::EPSILON);
        assert_eq!(records[1].note.as_deref(), Some("cracked"));
    }

    #[test]
    fn curb_rows_recompute_hazard_length() {
        let records = parse(SURVEY_CSV.as_bytes(), Stage::Survey).unwrap();
        let curb = &records[2];
        assert_eq!(curb.special_case, Some(SpecialCase::Curb));
        assert!((curb.measured_hazard_length - 120.0).abs() < f64::EPSILON);
    }

    #[test]
    fn strips_byte_order_mark() {
        let mut bytes = UTF8_BOM.to_vec();
        bytes.extend_from_slice(SURVEY_CSV.as_bytes());
        let records = parse(&bytes, Stage::Survey).unwrap();
        assert_eq!(records[0].object_id, 1);
    }

    #[test]
    fn header_only_file_is_empty() {
        let records = parse(b"OBJECTID,x,y,CreationDate\n", Stage::Survey).unwrap();
        assert!(records.is_empty());
        assert!(parse(b"", Stage::Production).unwrap().is_empty());
    }

    #[test]
    fn survey_round_trips_through_export() {
        let records = parse(SURVEY_CSV.as_bytes(), Stage::Survey).unwrap();
        let exported = serialize(&records, Stage::Survey).unwrap();
        let reparsed = parse(&exported, Stage::Survey).unwrap();
        assert_eq!(reparsed, records);
    }

    #[test]
    fn production_round_trips_through_export() {
        let csv = "\
OBJECTID,x,y,Creator,CreationDate,Special Case,Curb Length (feet),Length,Width,Slope
1,-122.4194,37.7749,jdoe,01/15/2024 09:15 AM,Curb,10,,,
2,-122.4190,37.7750,jdoe,01/15/2024 10:00 AM,,,4,2,2%
";
        let records = parse(csv.as_bytes(), Stage::Production).unwrap();
        assert!((records[0].length - 0.5).abs() < f64::EPSILON);
        assert_eq!(records[1].slope(), Some("2%"));

        let exported = serialize(&records, Stage::Production).unwrap();
        assert_eq!(parse(&exported, Stage::Production).unwrap(), records);
    }

    #[test]
    fn export_uses_labels_and_fixed_order() {
        let records = parse(SURVEY_CSV.as_bytes(), Stage::Survey).unwrap();
        let exported = String::from_utf8(serialize(&records, Stage::Survey).unwrap()).unwrap();
        let mut lines = exported.lines();
        let header = lines.next().unwrap();
        assert!(header.starts_with("OBJECTID,Start Street - Area,Width,Length,SQFT"));
        assert!(header.ends_with(",y,x"));
        assert!(exported.contains(",Curb,"));
        assert!(exported.contains("2024-01-15T14:30:00Z"));
    }

    #[test]
    fn invalid_row_aborts_with_row_number() {
        let csv = "\
OBJECTID,x,y,Creator,CreationDate,Special Case
1,-122.4194,37.7749,jdoe,2024-01-15,
2,-122.4190,37.7750,jdoe,2024-01-15,Pothole
";
        let err = parse(csv.as_bytes(), Stage::Production).unwrap_err();
        match err {
            CodecError::Validation(ValidationError { row, kind }) => {
                assert_eq!(row, 2);
                assert_eq!(
                    kind,
                    ValidationErrorKind::InvalidEnumValue {
                        field: "special_case",
                        value: "Pothole".to_string(),
                    }
                );
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
