use std::env;
use std::path::{Path, PathBuf};

use chrono_tz::Tz;
use serde::Deserialize;
use thiserror::Error;

use crate::cleaner::{CleanerConfig, DEFAULT_SOURCE_TAG};
use crate::geofence::{Geofence, GeofenceError};

pub const CONFIG_PATH_VAR: &str = "FERJE_CONFIG";
pub const TIMEZONE_VAR: &str = "FERJE_TIMEZONE";
pub const SOURCE_TAG_VAR: &str = "FERJE_SOURCE_TAG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("unknown time zone '{0}'")]
    UnknownTimezone(String),
    #[error("delimiter must be exactly one character, got '{0}'")]
    InvalidDelimiter(String),
    #[error("invalid geofence: {0}")]
    Geofence(#[from] GeofenceError),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImporterConfig {
    pub geofence: GeofenceConfig,
    pub timezone: String,
    pub source_tag: String,
    pub delimiter: String,
    pub naming: NamingConfig,
}

impl Default for ImporterConfig {
    fn default() -> Self {
        Self {
            geofence: GeofenceConfig::default(),
            timezone: "Europe/Oslo".to_string(),
            source_tag: DEFAULT_SOURCE_TAG.to_string(),
            delimiter: ";".to_string(),
            naming: NamingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeofenceConfig {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl Default for GeofenceConfig {
    fn default() -> Self {
        let area = Geofence::TRONDHEIM_HARBOUR;
        Self {
            min_lat: area.min_lat(),
            max_lat: area.max_lat(),
            min_lon: area.min_lon(),
            max_lon: area.max_lon(),
        }
    }
}

impl GeofenceConfig {
    pub fn build(&self) -> Result<Geofence, GeofenceError> {
        Geofence::new(self.min_lat, self.max_lat, self.min_lon, self.max_lon)
    }
}

/// How a position file's companion metadata file is named:
/// `2018-07-02.csv` pairs with `2018-07-02_shipdata.csv`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NamingConfig {
    pub metadata_suffix: String,
    pub extension: String,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            metadata_suffix: "_shipdata".to_string(),
            extension: ".csv".to_string(),
        }
    }
}

impl NamingConfig {
    /// Stem of a position file key, or `None` for metadata files and other
    /// objects the importer does not handle.
    pub fn position_stem<'a>(&self, key: &'a str) -> Option<&'a str> {
        let stem = key.strip_suffix(self.extension.as_str())?;
        if stem.is_empty() || stem.ends_with(self.metadata_suffix.as_str()) {
            return None;
        }
        Some(stem)
    }

    pub fn metadata_key(&self, stem: &str) -> String {
        format!("{stem}{}{}", self.metadata_suffix, self.extension)
    }
}

impl ImporterConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Loads `explicit` if given, else the file named by `FERJE_CONFIG`, else
    /// the defaults; then applies `FERJE_TIMEZONE` / `FERJE_SOURCE_TAG`.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let mut config = match explicit {
            Some(path) => Self::load(path)?,
            None => match env::var(CONFIG_PATH_VAR) {
                Ok(path) if !path.is_empty() => Self::load(path)?,
                _ => Self::default(),
            },
        };
        config.apply_overrides(|key| env::var(key).ok());
        Ok(config)
    }

    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(timezone) = lookup(TIMEZONE_VAR).filter(|v| !v.is_empty()) {
            self.timezone = timezone;
        }
        if let Some(source_tag) = lookup(SOURCE_TAG_VAR).filter(|v| !v.is_empty()) {
            self.source_tag = source_tag;
        }
    }

    pub fn cleaner_config(&self) -> Result<CleanerConfig, ConfigError> {
        let timezone = self
            .timezone
            .parse::<Tz>()
            .map_err(|_| ConfigError::UnknownTimezone(self.timezone.clone()))?;

        let mut chars = self.delimiter.chars();
        let delimiter = match (chars.next(), chars.next()) {
            (Some(ch), None) => ch,
            _ => return Err(ConfigError::InvalidDelimiter(self.delimiter.clone())),
        };

        Ok(CleanerConfig {
            geofence: self.geofence.build()?,
            timezone,
            source_tag: self.source_tag.clone(),
            delimiter,
        })
    }
}
