//! Hazard tier totals used as the default hazard summary of a production
//! instruction.

use sidewalk_measurement_models::{
    HazardSummary, HazardTier, HazardTotals, MeasurementRecord, TOTALS_KEY,
};

/// Totals for the records recorded at `tier`'s hazard size.
fn tier_totals(records: &[MeasurementRecord], tier: HazardTier) -> HazardTotals {
    records
        .iter()
        .filter(|record| record.hazard_size == Some(tier.size()))
        .fold(HazardTotals::default(), |acc, record| {
            acc + HazardTotals {
                count: 1,
                inch_feet: record.inch_feet,
                square_feet: record.square_feet(),
            }
        })
}

/// Computes count, inch-feet, and square feet per hazard tier over a survey
/// measurement set, plus a [`TOTALS_KEY`] entry with the column-wise sum.
#[must_use]
pub fn hazard_totals(records: &[MeasurementRecord]) -> HazardSummary {
    let mut summary = HazardSummary::default();
    let mut totals = HazardTotals::default();

    for tier in HazardTier::all() {
        let tier_sum = tier_totals(records, *tier);
        totals += tier_sum;
        summary.0.insert(tier.as_ref().to_string(), tier_sum);
    }

    summary.0.insert(TOTALS_KEY.to_string(), totals);

    log::debug!(
        "Computed hazard totals over {} records: {} hazards",
        records.len(),
        totals.count
    );

    summary
}
