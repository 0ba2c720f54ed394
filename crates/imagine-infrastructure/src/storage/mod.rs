//! Storage layer for atomic file operations.

mod atomic;
mod config_storage;

pub use atomic::write_atomic;
pub use config_storage::{ConfigStorage, ConfigStorageError};
