//! File-system side of the application: paths, settings and credential files,
//! generation records and image artifacts.

pub mod artifact_writer;
pub mod credential_store;
pub mod paths;
pub mod record_store;
pub mod settings_service;
pub mod storage;

pub use crate::artifact_writer::{BatchSaveReport, write_batch};
pub use crate::credential_store::CredentialStore;
pub use crate::paths::ImaginePaths;
pub use crate::record_store::GenerationStore;
pub use crate::settings_service::SettingsService;
