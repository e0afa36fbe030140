//! Estimated sidewalk length walked by a survey.

use geo::{Distance as _, Geodesic, Point};
use sidewalk_measurement_models::MeasurementRecord;

/// International mile in meters.
pub const METERS_PER_MILE: f64 = 1_609.344;

fn point(record: &MeasurementRecord) -> Point<f64> {
    Point::new(record.coordinate.longitude, record.coordinate.latitude)
}

/// Sums the ellipsoidal (WGS84) distance between consecutive survey
/// measurements ordered by `object_id`, in miles.
///
/// Records sharing an `object_id` keep their input order. Fewer than two
/// records yield `0.0`.
#[must_use]
pub fn estimated_sidewalk_miles(records: &[MeasurementRecord]) -> f64 {
    let mut ordered: Vec<&MeasurementRecord> = records.iter().collect();
    ordered.sort_by_key(|record| record.object_id);

    let meters: f64 = ordered
        .windows(2)
        .map(|pair| Geodesic.distance(point(pair[0]), point(pair[1])))
        .sum();

    let miles = meters / METERS_PER_MILE;
    log::debug!(
        "Estimated {miles:.3} sidewalk miles over {} measurements",
        records.len()
    );
    miles
}
