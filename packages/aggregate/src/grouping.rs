//! Document listing buckets.

use std::collections::HashMap;

use sidewalk_measurement_models::{GroupKey, MeasurementGroup, MeasurementRecord, StageDetails};

fn group_key(record: &MeasurementRecord) -> GroupKey {
    match &record.details {
        StageDetails::Survey { survey_group, .. } => GroupKey::SurveyGroup(survey_group.clone()),
        StageDetails::Production { .. } => GroupKey::WorkDate(record.work_date()),
    }
}

/// Buckets an ordered measurement set for document layout.
///
/// Survey records are grouped by survey group label and production records
/// by work date. Buckets appear in first-seen order. Records in a survey
/// bucket keep their input order; records in a production bucket are sorted
/// by `(tech, object_id)`.
#[must_use]
pub fn group_measurements(records: &[MeasurementRecord]) -> Vec<MeasurementGroup> {
    let mut index: HashMap<GroupKey, usize> = HashMap::new();
    let mut groups: Vec<MeasurementGroup> = Vec::new();

    for record in records {
        let key = group_key(record);
        let slot = *index.entry(key.clone()).or_insert_with(|| {
            groups.push(MeasurementGroup {
                key,
                records: Vec::new(),
            });
            groups.len() - 1
        });
        groups[slot].records.push(record.clone());
    }

    for group in &mut groups {
        if matches!(group.key, GroupKey::WorkDate(_)) {
            group
                .records
                .sort_by(|a, b| (&a.tech, a.object_id).cmp(&(&b.tech, b.object_id)));
        }
    }

    groups
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone as _, Utc};
    use sidewalk_measurement_models::Coordinate;

    use super::*;

    fn record(object_id: i64, details: StageDetails) -> MeasurementRecord {
        MeasurementRecord {
            object_id,
            coordinate: Coordinate::new(-122.4194, 37.7749),
            length: 0.0,
            width: 0.0,
            area: 0.0,
            h1: 0.0,
            h2: 0.0,
            curb_length: 0.0,
            measured_hazard_length: 0.0,
            inch_feet: 0.0,
            special_case: None,
            hazard_size: None,
            tech: None,
            note: None,
            geocoded_address: None,
            measured_at: Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap(),
            details,
        }
    }

    fn survey(object_id: i64, group: &str) -> MeasurementRecord {
        record(
            object_id,
            StageDetails::Survey {
                survey_group: group.to_string(),
                survey_address: None,
            },
        )
    }

    fn production(object_id: i64, tech: &str, day: u32) -> MeasurementRecord {
        let mut rec = record(object_id, StageDetails::Production { slope: None });
        rec.tech = Some(tech.to_string());
        rec.measured_at = Utc.with_ymd_and_hms(2024, 1, day, 9, 0, 0).unwrap();
        rec
    }

    #[test]
    fn survey_groups_keep_first_seen_order() {
        let records = vec![
            survey(1, "Oak Ave"),
            survey(2, "Elm St"),
            survey(3, "Oak Ave"),
        ];
        let groups = group_measurements(&records);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].key, GroupKey::SurveyGroup("Oak Ave".to_string()));
        let ids: Vec<_> = groups[0].records.iter().map(|r| r.object_id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(groups[1].key, GroupKey::SurveyGroup("Elm St".to_string()));
    }

    #[test]
    fn production_days_sort_by_tech_then_object_id() {
        let records = vec![
            production(5, "zeta", 16),
            production(4, "beta", 15),
            production(2, "alpha", 15),
            production(1, "beta", 15),
        ];
        let groups = group_measurements(&records);

        assert_eq!(
            groups[0].key,
            GroupKey::WorkDate(NaiveDate::from_ymd_opt(2024, 1, 16).unwrap())
        );
        let ids: Vec<_> = groups[1].records.iter().map(|r| r.object_id).collect();
        assert_eq!(ids, vec![2, 1, 4]);
    }

    #[test]
    fn empty_set_has_no_groups() {
        assert!(group_measurements(&[]).is_empty());
    }
}
