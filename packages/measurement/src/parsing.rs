//! Cell-level parsing for measurement exports.
//!
//! The collection app has shipped several date layouts over the years, so
//! timestamps are tried against a list of formats in turn.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SubsecRound as _, Utc};

/// Fractional digits kept on parsed timestamps. Storage holds microseconds.
const SUBSEC_DIGITS: u16 = 6;

/// Layouts carrying a UTC offset. The offset is dropped and the wall-clock
/// time is kept.
const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%z",
];

/// Zone names that mean UTC when trailing an otherwise naive layout.
const ZONE_NAMES: &[&str] = &[" UTC", " GMT"];

/// Layouts without an offset. Two-digit years come first so `%Y` does not
/// swallow `24` as year 24. `%b` also accepts full month names.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M",
    "%m/%d/%y %I:%M:%S %p",
    "%m/%d/%y %I:%M %p",
    "%m/%d/%y %H:%M:%S",
    "%m/%d/%y %H:%M",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %I:%M %p",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%b %d, %Y %I:%M:%S %p",
    "%b %d, %Y %I:%M %p",
    "%b %d, %Y %H:%M:%S",
    "%b %d, %Y %H:%M",
    "%d %b %Y %H:%M:%S",
    "%d %b %Y %H:%M",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%y",
    "%m/%d/%Y",
    "%b %d, %Y",
    "%b %d %Y",
    "%d %b %Y",
];

/// Parses a `CreationDate` cell.
///
/// A purely numeric value is epoch milliseconds. Anything else is tried
/// against RFC 3339, RFC 2822, offset layouts, naive layouts (optionally
/// followed by `UTC` or `GMT`), and finally bare dates (midnight). Returns
/// `None` for blank or unrecognized input.
///
/// Results are truncated to whole microseconds.
#[must_use]
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    let parsed = parse_layouts(s);
    if parsed.is_none() {
        log::debug!("Unrecognized timestamp: {s:?}");
    }
    parsed.map(|dt| dt.trunc_subsecs(SUBSEC_DIGITS))
}

fn parse_layouts(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(ms) = s.parse::<f64>() {
        if !ms.is_finite() {
            return None;
        }
        #[allow(clippy::cast_possible_truncation)]
        let millis = ms.round() as i64;
        return DateTime::from_timestamp_millis(millis);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local().and_utc());
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.naive_local().and_utc());
    }

    for format in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, format) {
            return Some(dt.naive_local().and_utc());
        }
    }

    let s = ZONE_NAMES
        .iter()
        .find_map(|zone| s.strip_suffix(zone))
        .map_or(s, str::trim_end);

    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc());
        }
    }

    DATE_FORMATS.iter().find_map(|format| {
        NaiveDate::parse_from_str(s, format)
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc())
    })
}

/// Parses a finite number. Returns `None` for anything else, including
/// `NaN` and infinities.
#[must_use]
pub fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|value| value.is_finite())
}

/// Returns the trimmed cell, or `None` if it is blank.
#[must_use]
pub fn non_blank(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}
