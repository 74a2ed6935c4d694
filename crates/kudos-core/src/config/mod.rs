//! Configuration parsing and management.
//!
//! This module handles parsing of the engine configuration file (TOML) that
//! defines the ledger database location, the day-boundary policy, and an
//! optional catalog file.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::clock::DayBoundary;

/// Errors from configuration handling.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O error reading a config file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid TOML.
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// Serialization failure.
    #[error("config serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A value failed validation.
    #[error("config validation error: {0}")]
    Validation(String),
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EngineConfig {
    /// Ledger storage settings.
    #[serde(default)]
    pub ledger: LedgerConfig,

    /// Calendar-day policy settings.
    #[serde(default)]
    pub day_boundary: DayBoundaryConfig,

    /// Catalog source settings.
    #[serde(default)]
    pub catalog: CatalogConfig,
}

/// Ledger storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Path to the wallet database.
    #[serde(default = "default_ledger_path")]
    pub path: PathBuf,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            path: default_ledger_path(),
        }
    }
}

/// Calendar-day policy settings.
///
/// The offset applies to every date derivation in the engine; there is
/// deliberately no per-query override.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DayBoundaryConfig {
    /// Fixed offset east of UTC, in minutes. Defaults to UTC.
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

/// Catalog source settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CatalogConfig {
    /// Path to a TOML catalog file. When absent, the built-in seed set is
    /// used.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl EngineConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if
    /// validation fails.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or the day-boundary offset is
    /// out of range.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// The [`DayBoundary`] this configuration describes.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the offset is out of range.
    pub fn day_boundary(&self) -> Result<DayBoundary, ConfigError> {
        DayBoundary::from_offset_minutes(self.day_boundary.utc_offset_minutes).map_err(|err| {
            ConfigError::Validation(err.to_string())
        })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.day_boundary()?;
        Ok(())
    }
}

fn default_ledger_path() -> PathBuf {
    PathBuf::from("wallet.db")
}
