//! Config file storage.
//!
//! Returns data as `serde_json::Value` (intermediate format) to decouple callers
//! from TOML specifics. Files are not locked; a single process owns the data
//! directory.

use serde_json::Value as JsonValue;
use std::fs;
use std::path::{Path, PathBuf};

use super::atomic::write_atomic;

/// Errors that can occur during config storage operations.
#[derive(Debug)]
pub enum ConfigStorageError {
    /// File I/O error.
    IoError(std::io::Error),
    /// TOML parsing error.
    TomlParseError(toml::de::Error),
    /// TOML serialization error.
    TomlSerError(toml::ser::Error),
    /// JSON conversion error.
    JsonError(serde_json::Error),
}

impl ConfigStorageError {
    /// True when the file exists but its contents are unusable.
    pub fn is_corruption(&self) -> bool {
        match self {
            ConfigStorageError::TomlParseError(_) => true,
            ConfigStorageError::IoError(e) => e.kind() == std::io::ErrorKind::InvalidData,
            _ => false,
        }
    }
}

impl std::fmt::Display for ConfigStorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigStorageError::IoError(e) => write!(f, "I/O error: {}", e),
            ConfigStorageError::TomlParseError(e) => write!(f, "TOML parse error: {}", e),
            ConfigStorageError::TomlSerError(e) => write!(f, "TOML serialization error: {}", e),
            ConfigStorageError::JsonError(e) => write!(f, "JSON conversion error: {}", e),
        }
    }
}

impl std::error::Error for ConfigStorageError {}

impl From<std::io::Error> for ConfigStorageError {
    fn from(e: std::io::Error) -> Self {
        ConfigStorageError::IoError(e)
    }
}

impl From<toml::de::Error> for ConfigStorageError {
    fn from(e: toml::de::Error) -> Self {
        ConfigStorageError::TomlParseError(e)
    }
}

impl From<toml::ser::Error> for ConfigStorageError {
    fn from(e: toml::ser::Error) -> Self {
        ConfigStorageError::TomlSerError(e)
    }
}

impl From<serde_json::Error> for ConfigStorageError {
    fn from(e: serde_json::Error) -> Self {
        ConfigStorageError::JsonError(e)
    }
}

impl From<ConfigStorageError> for imagine_core::ImagineError {
    fn from(e: ConfigStorageError) -> Self {
        match e {
            ConfigStorageError::IoError(e) => e.into(),
            ConfigStorageError::TomlParseError(e) => e.into(),
            ConfigStorageError::TomlSerError(e) => e.into(),
            ConfigStorageError::JsonError(e) => e.into(),
        }
    }
}

/// A TOML config file read and written as `serde_json::Value`.
///
/// Responsibilities:
/// - **Atomic write** (tmp file + rename)
/// - **Format conversion** (TOML ⇄ serde_json::Value)
///
/// Does NOT know about settings rules or repair them; that is the
/// reconciler's job.
pub struct ConfigStorage {
    path: PathBuf,
}

impl ConfigStorage {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the config file as a `serde_json::Value`.
    ///
    /// - `Ok(Some(JsonValue))`: Successfully loaded and converted to JSON
    /// - `Ok(None)`: File doesn't exist or is empty
    /// - `Err`: Failed to read or parse the file
    pub fn load(&self) -> Result<Option<JsonValue>, ConfigStorageError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path)?;

        if content.trim().is_empty() {
            return Ok(None);
        }

        let toml_value: toml::Value = toml::from_str(&content)?;
        let json_value = toml_to_json(toml_value)?;

        Ok(Some(json_value))
    }

    /// Saves data to the config file atomically.
    pub fn save(&self, data: &JsonValue) -> Result<(), ConfigStorageError> {
        let toml_value = json_to_toml(data)?;
        let toml_string = toml::to_string_pretty(&toml_value)?;
        write_atomic(&self.path, toml_string.as_bytes(), None)?;
        Ok(())
    }
}

/// Converts a toml::Value to serde_json::Value.
fn toml_to_json(toml_value: toml::Value) -> Result<JsonValue, ConfigStorageError> {
    Ok(serde_json::to_value(toml_value)?)
}

/// Converts a serde_json::Value to toml::Value.
fn json_to_toml(json_value: &JsonValue) -> Result<toml::Value, ConfigStorageError> {
    Ok(serde_json::from_value(json_value.clone())?)
}
