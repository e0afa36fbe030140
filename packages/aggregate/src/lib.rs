#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Aggregations over a stored measurement set.
//!
//! These are pure functions over already-validated records: the document
//! listing buckets, the default hazard tier totals for a production
//! instruction, and the estimated sidewalk length walked by a survey.

pub mod geometry;
pub mod grouping;
pub mod hazards;

pub use geometry::{METERS_PER_MILE, estimated_sidewalk_miles};
pub use grouping::group_measurements;
pub use hazards::hazard_totals;
