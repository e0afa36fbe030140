//! Layered TOML configuration.
//!
//! The embedded `config/default.toml` is always loaded first. An optional
//! user file is merged over it table by table, so it only needs the keys
//! it changes.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use sidewalk_geocoder::GeocoderConfig;

const DEFAULT_CONFIG: &str = include_str!("../config/default.toml");

/// Errors from loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The user file could not be read.
    #[error("Failed to read {path}: {source}")]
    Io {
        /// File that was being read.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// A file is not valid TOML.
    #[error("Invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Report view settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ReportConfig {
    /// Longest production report window, in days.
    pub max_range_days: u32,
}

/// Top-level CLI configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PipelineConfig {
    /// Directory holding the database file.
    pub data_dir: Option<PathBuf>,
    /// Database file name inside `data_dir`.
    pub database_file: String,
    /// Reverse-geocoding settings.
    pub geocoding: GeocoderConfig,
    /// Report settings.
    pub report: ReportConfig,
}

fn merge(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(table)) => {
                merge(existing, table);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

impl PipelineConfig {
    /// Loads the defaults, merges `path` over them if given, then applies
    /// a data directory override.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or either
    /// document is invalid.
    pub fn load(path: Option<&Path>, data_dir: Option<PathBuf>) -> Result<Self, ConfigError> {
        let overlay = path
            .map(|path| {
                std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            })
            .transpose()?;

        let mut config = Self::from_layers(overlay.as_deref())?;
        if let Some(data_dir) = data_dir {
            config.data_dir = Some(data_dir);
        }

        log::debug!("Loaded configuration: {config:?}");
        Ok(config)
    }

    fn from_layers(overlay: Option<&str>) -> Result<Self, ConfigError> {
        let mut table: toml::Table = toml::from_str(DEFAULT_CONFIG)?;
        if let Some(overlay) = overlay {
            merge(&mut table, toml::from_str(overlay)?);
        }
        Ok(toml::Value::Table(table).try_into()?)
    }

    /// Full path of the database file.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        let data_dir = self
            .data_dir
            .clone()
            .unwrap_or_else(sidewalk_database::paths::data_dir);
        sidewalk_database::paths::database_path(&data_dir, &self.database_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_defaults_parse() {
        let config = PipelineConfig::from_layers(None).unwrap();
        assert_eq!(config.data_dir, None);
        assert_eq!(config.database_file, "sidewalk.duckdb");
        assert_eq!(config.report.max_range_days, 100);
        assert_eq!(config.geocoding, GeocoderConfig::default());
    }

    #[test]
    fn overlay_replaces_only_given_keys() {
        let config = PipelineConfig::from_layers(Some(
            r#"
            data_dir = "/var/lib/sidewalk"

            [geocoding]
            enabled = false
            "#,
        ))
        .unwrap();

        assert_eq!(config.data_dir, Some(PathBuf::from("/var/lib/sidewalk")));
        assert!(!config.geocoding.enabled);
        assert_eq!(config.geocoding.rate_limit_ms, 1000);
        assert_eq!(config.report.max_range_days, 100);
        assert_eq!(
            config.database_path(),
            PathBuf::from("/var/lib/sidewalk/sidewalk.duckdb")
        );
    }

    #[test]
    fn data_dir_override_wins() {
        let config = PipelineConfig::load(None, Some(PathBuf::from("/tmp/override"))).unwrap();
        assert_eq!(config.data_dir, Some(PathBuf::from("/tmp/override")));
    }

    #[test]
    fn invalid_overlay_is_an_error() {
        assert!(matches!(
            PipelineConfig::from_layers(Some("report = [")),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn missing_file_is_an_error() {
        let result = PipelineConfig::load(Some(Path::new("/nonexistent/sidewalk.toml")), None);
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }
}
