//! Credential file storage (`{data}/.env`).
//!
//! The file is plain `KEY=VALUE` text and is rewritten in normalized form on
//! every load and update. It holds API keys, so it is created with mode 0600 on
//! Unix.

use imagine_core::Result;
use imagine_core::credentials::Credentials;
use std::fs;
use std::path::{Path, PathBuf};

use crate::storage::write_atomic;

const CREDENTIALS_MODE: u32 = 0o600;

pub struct CredentialStore {
    path: PathBuf,
    known_keys: Vec<&'static str>,
}

impl CredentialStore {
    /// Creates a store that keeps only `known_keys`.
    pub fn new(path: PathBuf, known_keys: Vec<&'static str>) -> Self {
        Self { path, known_keys }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads and normalizes the file, writing the normalized form back.
    ///
    /// A missing file is created empty.
    pub fn load(&self) -> Result<Credentials> {
        let raw = self.read_raw()?;
        let credentials = Credentials::normalize(&raw, &self.known_keys);
        let rendered = credentials.render();
        if rendered != raw || !self.path.exists() {
            tracing::debug!(path = %self.path.display(), "rewriting normalized credential file");
            self.write(&credentials)?;
        }
        Ok(credentials)
    }

    /// Sets `key` to `value`, or removes it when `value` is `None`.
    pub fn upsert(&self, key: &str, value: Option<&str>) -> Result<Credentials> {
        let mut credentials = Credentials::normalize(&self.read_raw()?, &self.known_keys);
        let value = value.map(str::trim).filter(|v| !v.is_empty());
        match value {
            Some(value) => credentials.set(key, value),
            None => {
                credentials.remove(key);
            }
        }
        self.write(&credentials)?;
        tracing::info!(key, removed = value.is_none(), "credential file updated");
        Ok(credentials)
    }

    fn read_raw(&self) -> Result<String> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => Ok(raw),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, credentials: &Credentials) -> Result<()> {
        write_atomic(
            &self.path,
            credentials.render().as_bytes(),
            Some(CREDENTIALS_MODE),
        )?;
        Ok(())
    }
}
