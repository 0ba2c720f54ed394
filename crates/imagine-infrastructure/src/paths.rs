//! Unified path management for the data directory.

use std::io;
use std::path::{Path, PathBuf};

/// Errors that can occur during path resolution.
#[derive(Debug)]
pub enum PathError {
    /// No platform data directory could be determined.
    DataDirNotFound,
}

impl std::fmt::Display for PathError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathError::DataDirNotFound => write!(f, "Cannot find a local data directory"),
        }
    }
}

impl std::error::Error for PathError {}

/// Resolved locations of everything the application persists.
///
/// # Directory Structure
///
/// ```text
/// {data}/                      # dirs::data_local_dir()/imagine by default
/// ├── config.toml              # Reconciled settings
/// ├── .env                     # API keys (KEY=VALUE, mode 0600)
/// ├── generations/             # One directory per generation record
/// │   └── {title}/
/// │       ├── settings.txt
/// │       └── 1.png ...
/// └── logs/
///     └── imagine.log.YYYY-MM-DD
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImaginePaths {
    root: PathBuf,
}

impl ImaginePaths {
    /// Uses `base` as the data directory, or the platform default when `None`.
    pub fn new(base: Option<&Path>) -> Result<Self, PathError> {
        let root = match base {
            Some(base) => base.to_path_buf(),
            None => Self::default_root()?,
        };
        Ok(Self { root })
    }

    fn default_root() -> Result<PathBuf, PathError> {
        dirs::data_local_dir()
            .map(|dir| dir.join("imagine"))
            .ok_or(PathError::DataDirNotFound)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn settings_file(&self) -> PathBuf {
        self.root.join("config.toml")
    }

    pub fn credentials_file(&self) -> PathBuf {
        self.root.join(".env")
    }

    pub fn generations_dir(&self) -> PathBuf {
        self.root.join("generations")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    /// Creates the data, generations and logs directories.
    ///
    /// Returns `true` when the data directory did not exist before, i.e. this
    /// is the first start.
    pub fn ensure_dirs(&self) -> io::Result<bool> {
        let first_start = !self.root.exists();
        std::fs::create_dir_all(&self.root)?;
        std::fs::create_dir_all(self.generations_dir())?;
        std::fs::create_dir_all(self.logs_dir())?;
        Ok(first_start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_layout_under_custom_root() {
        let paths = ImaginePaths::new(Some(Path::new("/tmp/imagine-test"))).unwrap();
        assert_eq!(paths.settings_file(), Path::new("/tmp/imagine-test/config.toml"));
        assert_eq!(paths.credentials_file(), Path::new("/tmp/imagine-test/.env"));
        assert!(paths.generations_dir().ends_with("generations"));
        assert!(paths.logs_dir().starts_with(paths.root()));
    }

    #[test]
    fn test_ensure_dirs_reports_first_start() {
        let temp_dir = TempDir::new().unwrap();
        let paths = ImaginePaths::new(Some(&temp_dir.path().join("data"))).unwrap();

        assert!(paths.ensure_dirs().unwrap());
        assert!(paths.generations_dir().is_dir());
        assert!(paths.logs_dir().is_dir());
        assert!(!paths.ensure_dirs().unwrap());
    }
}
