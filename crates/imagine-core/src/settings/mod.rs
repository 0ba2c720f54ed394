//! Application settings: canonical schema, typed values and reconciliation.

mod model;
mod reconcile;
mod schema;

pub use model::{Setting, SettingKind, SettingValue, Settings};
pub use reconcile::{PersistedSettings, Reconciled, Repair, reconcile};
pub use schema::{
    ALWAYS_VERIFY_KEYS, BATCH_SIZE, BATCH_TIMEOUT, DEFAULT_ALWAYS_VERIFY_KEYS, DEFAULT_BATCH_SIZE,
    DEFAULT_BATCH_TIMEOUT_SECS, DEFAULT_MAX_IMAGES, MAX_IMAGES, MIN_TEXT_LENGTH, SettingRule,
    SettingsSchema,
};
