//! Display-labeled rendering of the production report for the dashboard
//! table.

use serde::ser::{Serialize, SerializeMap as _, Serializer};
use serde_json::Value;
use sidewalk_measurement_models::TechProductionRow;

/// Column label for the technician.
pub const TECH_LABEL: &str = "Tech";
/// Column label for total inch-feet.
pub const TOTAL_LABEL: &str = "Total";
/// Column label for distinct days worked.
pub const DAYS_LABEL: &str = "# Days Worked";
/// Column label for average inch-feet per day worked.
pub const AVERAGE_LABEL: &str = "Avg/Day";
/// Column label for the record count.
pub const RECORDS_LABEL: &str = "# Records";

/// A report row as ordered `(label, value)` cells.
///
/// Serializes as a JSON object whose keys keep column order: technician,
/// one `MM/DD/YYYY` column per day, then the totals.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledRow(pub Vec<(String, Value)>);

impl LabeledRow {
    /// Looks up a cell by label.
    #[must_use]
    pub fn get(&self, label: &str) -> Option<&Value> {
        self.0
            .iter()
            .find(|(key, _)| key == label)
            .map(|(_, value)| value)
    }

    /// Column labels in order.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(key, _)| key.as_str())
    }
}

impl Serialize for LabeledRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in &self.0 {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn number(value: f64) -> Value {
    serde_json::Number::from_f64(round2(value)).map_or(Value::Null, Value::Number)
}

/// Renders report rows with display labels, rounding floats to two
/// decimals.
#[must_use]
pub fn labeled_table(rows: &[TechProductionRow]) -> Vec<LabeledRow> {
    rows.iter()
        .map(|row| {
            let mut cells = Vec::with_capacity(row.daily.len() + 5);
            cells.push((TECH_LABEL.to_string(), Value::String(row.tech.clone())));
            for (day, inch_feet) in &row.daily {
                cells.push((day.format("%m/%d/%Y").to_string(), number(*inch_feet)));
            }
            cells.push((TOTAL_LABEL.to_string(), number(row.total_inch_feet)));
            cells.push((DAYS_LABEL.to_string(), Value::from(row.total_days)));
            cells.push((
                AVERAGE_LABEL.to_string(),
                row.average_per_day.map_or(Value::Null, number),
            ));
            cells.push((RECORDS_LABEL.to_string(), Value::from(row.total_records)));
            LabeledRow(cells)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::NaiveDate;

    use super::*;

    fn row() -> TechProductionRow {
        let mut daily = BTreeMap::new();
        daily.insert(NaiveDate::from_ymd_opt(2024, 1, 9).unwrap(), 10.0 / 3.0);
        daily.insert(NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(), 0.0);
        TechProductionRow {
            tech: "jdoe".to_string(),
            total_records: 4,
            total_days: 1,
            total_inch_feet: 10.0 / 3.0,
            average_per_day: Some(10.0 / 3.0),
            daily,
        }
    }

    #[test]
    fn columns_are_labeled_in_display_order() {
        let table = labeled_table(&[row()]);
        let labels: Vec<_> = table[0].labels().collect();
        assert_eq!(
            labels,
            vec![
                "Tech",
                "01/09/2024",
                "01/10/2024",
                "Total",
                "# Days Worked",
                "Avg/Day",
                "# Records"
            ]
        );
    }

    #[test]
    fn floats_are_rounded_to_cents() {
        let table = labeled_table(&[row()]);
        assert_eq!(table[0].get("Total"), Some(&serde_json::json!(3.33)));
        assert_eq!(table[0].get("01/09/2024"), Some(&serde_json::json!(3.33)));
        assert_eq!(table[0].get("# Records"), Some(&serde_json::json!(4)));
    }

    #[test]
    fn serializes_as_ordered_object() {
        let table = labeled_table(&[row()]);
        let json = serde_json::to_string(&table[0]).unwrap();
        assert!(json.starts_with(r#"{"Tech":"jdoe","01/09/2024":3.33"#));
        assert!(json.ends_with(r##""Avg/Day":3.33,"# Records":4}"##));
    }

    #[test]
    fn missing_average_is_null() {
        let mut empty = row();
        empty.average_per_day = None;
        let table = labeled_table(&[empty]);
        assert_eq!(table[0].get("Avg/Day"), Some(&Value::Null));
    }
}
