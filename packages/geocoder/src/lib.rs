#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Reverse geocoding for measurement sets.
//!
//! Consumes `"geocoding"` jobs published after an import. For each job the
//! project stage's measurements are loaded, every coordinate is
//! reverse-geocoded against a Nominatim instance one request at a time,
//! and the resulting `house_number road` text is written back as the
//! record's geocoded address.
//!
//! A point that cannot be resolved keeps a null address; it never fails
//! the job.

pub mod nominatim;
pub mod worker;

use serde::Deserialize;
use sidewalk_database::DbError;
use thiserror::Error;

pub use worker::{GeocodeSummary, Geocoder, NominatimClient, ReverseGeocoder};

/// Default public Nominatim reverse endpoint.
pub const DEFAULT_BASE_URL: &str = "https://nominatim.openstreetmap.org/reverse";

/// Default delay between requests. The public instance allows one per
/// second.
pub const DEFAULT_RATE_LIMIT_MS: u64 = 1_000;

/// Default `User-Agent` header. Nominatim rejects anonymous clients.
pub const DEFAULT_USER_AGENT: &str = "sidewalk-measurements/0.1";

/// Reverse-geocoding settings, read from the `[geocoding]` table of the
/// configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GeocoderConfig {
    /// Whether imports publish geocoding jobs at all.
    pub enabled: bool,
    /// Nominatim `/reverse` endpoint.
    pub base_url: String,
    /// Minimum delay between requests in milliseconds.
    pub rate_limit_ms: u64,
    /// `User-Agent` sent with every request.
    pub user_agent: String,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: DEFAULT_BASE_URL.to_string(),
            rate_limit_ms: DEFAULT_RATE_LIMIT_MS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// Errors from geocoding operations.
#[derive(Debug, Error)]
pub enum GeocodeError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response parsing failed.
    #[error("Parse error: {message}")]
    Parse {
        /// Description of the parsing failure.
        message: String,
    },

    /// Rate limit exceeded.
    #[error("Rate limit exceeded")]
    RateLimited,

    /// A job message could not be decoded.
    #[error("Invalid job message: {0}")]
    Job(#[from] serde_json::Error),

    /// Reading measurements or writing addresses failed.
    #[error("Storage error: {0}")]
    Storage(#[from] DbError),
}
