//! Loads, reconciles and persists the user settings file.

use imagine_core::settings::{
    PersistedSettings, Reconciled, SettingValue, Settings, SettingsSchema, reconcile,
};
use imagine_core::{ImagineError, Result};
use std::path::PathBuf;

use crate::storage::ConfigStorage;

/// Settings backed by `config.toml`.
///
/// Every load reconciles the file against the schema and writes the result
/// back, so the file on disk always matches the schema afterwards.
pub struct SettingsService {
    storage: ConfigStorage,
    schema: SettingsSchema,
}

impl SettingsService {
    pub fn new(path: PathBuf, schema: SettingsSchema) -> Self {
        Self {
            storage: ConfigStorage::new(path),
            schema,
        }
    }

    pub fn schema(&self) -> &SettingsSchema {
        &self.schema
    }

    /// Reads and reconciles the settings file, then persists the result.
    pub fn load(&self) -> Result<Reconciled> {
        let persisted = self.read_persisted()?;
        let reconciled = reconcile(&self.schema, &persisted);

        for repair in &reconciled.repairs {
            tracing::warn!(path = %self.storage.path().display(), "{repair}");
        }
        if !reconciled.dropped_keys.is_empty() {
            tracing::debug!(keys = ?reconciled.dropped_keys, "dropping unknown settings keys");
        }

        self.storage.save(&reconciled.settings.to_document()?)?;
        Ok(reconciled)
    }

    /// Validates and persists a new value for `key`.
    ///
    /// The file is reconciled first; if it had to be repaired the edit is
    /// refused, since the user was looking at values that no longer exist.
    pub fn update(&self, key: &str, value: SettingValue) -> Result<Settings> {
        let current = self.load()?;
        if current.changed {
            return Err(ImagineError::config(
                "Settings file was corrupted and has been repaired. Please review the settings and try again.",
            ));
        }

        current.settings.validate_edit(&self.schema, key, &value)?;
        let updated = current.settings.with_value(key, value);
        self.storage.save(&updated.to_document()?)?;

        tracing::info!(key, "setting updated");
        Ok(updated)
    }

    fn read_persisted(&self) -> Result<PersistedSettings> {
        match self.storage.load() {
            Ok(Some(document)) => Ok(PersistedSettings::Loaded(document)),
            Ok(None) => Ok(PersistedSettings::Missing),
            Err(e) if e.is_corruption() => Ok(PersistedSettings::Corrupted(e.to_string())),
            Err(e) => Err(e.into()),
        }
    }
}
