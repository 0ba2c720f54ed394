//! Canonical settings schema.

use super::model::{Setting, SettingValue, Settings};

pub const BATCH_SIZE: &str = "BATCH_SIZE";
pub const MAX_IMAGES: &str = "MAX_IMAGES";
pub const BATCH_TIMEOUT: &str = "BATCH_TIMEOUT";
pub const ALWAYS_VERIFY_KEYS: &str = "ALWAYS_VERIFY_KEYS";

pub const DEFAULT_BATCH_SIZE: i64 = 3;
pub const DEFAULT_MAX_IMAGES: i64 = 30;
pub const DEFAULT_BATCH_TIMEOUT_SECS: i64 = 45;
pub const DEFAULT_ALWAYS_VERIFY_KEYS: bool = false;

/// Minimum length accepted for free-text setting values.
pub const MIN_TEXT_LENGTH: usize = 3;

/// A canonical rule: key plus its default entry (value, description, bounds).
#[derive(Debug, Clone, PartialEq)]
pub struct SettingRule {
    pub key: String,
    pub default: Setting,
}

/// The immutable set of rules the settings file is reconciled against.
///
/// Built once at startup and shared by reference.
#[derive(Debug, Clone, PartialEq)]
pub struct SettingsSchema {
    rules: Vec<SettingRule>,
}

impl SettingsSchema {
    pub fn new(rules: Vec<SettingRule>) -> Self {
        Self { rules }
    }

    /// The schema shipped with the application.
    pub fn canonical() -> Self {
        Self::new(vec![
            SettingRule {
                key: BATCH_SIZE.to_string(),
                default: Setting::new(
                    SettingValue::Integer(DEFAULT_BATCH_SIZE),
                    "Amount of images to render in one batch.",
                )
                .with_bounds(SettingValue::Integer(1), SettingValue::Integer(10)),
            },
            SettingRule {
                key: MAX_IMAGES.to_string(),
                default: Setting::new(
                    SettingValue::Integer(DEFAULT_MAX_IMAGES),
                    "Maximum amount of images to render in one request (total between batches).",
                )
                .with_bounds(SettingValue::Integer(1), SettingValue::Integer(100)),
            },
            SettingRule {
                key: BATCH_TIMEOUT.to_string(),
                default: Setting::new(
                    SettingValue::Integer(DEFAULT_BATCH_TIMEOUT_SECS),
                    "Timeout (in seconds) between batches to avoid rate limits.",
                )
                .with_bounds(SettingValue::Integer(5), SettingValue::Integer(120)),
            },
            SettingRule {
                key: ALWAYS_VERIFY_KEYS.to_string(),
                default: Setting::new(
                    SettingValue::Boolean(DEFAULT_ALWAYS_VERIFY_KEYS),
                    "Whether to force verify all entered API keys.",
                ),
            },
        ])
    }

    pub fn rules(&self) -> &[SettingRule] {
        &self.rules
    }

    pub fn get(&self, key: &str) -> Option<&SettingRule> {
        self.rules.iter().find(|rule| rule.key == key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Every rule at its default, in schema order.
    pub fn default_settings(&self) -> Settings {
        Settings::from_entries(
            self.rules
                .iter()
                .map(|rule| (rule.key.clone(), rule.default.clone()))
                .collect(),
        )
    }
}

impl Default for SettingsSchema {
    fn default() -> Self {
        Self::canonical()
    }
}
