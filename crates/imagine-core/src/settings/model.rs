//! Setting values and the in-memory settings document.

use crate::error::{ImagineError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::fmt;
use std::time::Duration;

use super::schema::{
    ALWAYS_VERIFY_KEYS, BATCH_SIZE, BATCH_TIMEOUT, DEFAULT_ALWAYS_VERIFY_KEYS, DEFAULT_BATCH_SIZE,
    DEFAULT_BATCH_TIMEOUT_SECS, DEFAULT_MAX_IMAGES, MAX_IMAGES, MIN_TEXT_LENGTH, SettingsSchema,
};

/// The type of a setting value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingKind {
    Integer,
    Float,
    Boolean,
    Text,
}

impl fmt::Display for SettingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingKind::Integer => write!(f, "integer"),
            SettingKind::Float => write!(f, "float"),
            SettingKind::Boolean => write!(f, "boolean"),
            SettingKind::Text => write!(f, "string"),
        }
    }
}

/// A typed setting value.
///
/// Deserialization is untagged: `3` is an integer, `3.0` is a float.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl SettingValue {
    pub fn kind(&self) -> SettingKind {
        match self {
            SettingValue::Boolean(_) => SettingKind::Boolean,
            SettingValue::Integer(_) => SettingKind::Integer,
            SettingValue::Float(_) => SettingKind::Float,
            SettingValue::Text(_) => SettingKind::Text,
        }
    }

    /// Numeric view used for bound checks.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SettingValue::Integer(v) => Some(*v as f64),
            SettingValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SettingValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SettingValue::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    /// Parses raw user input into a value of the given kind.
    pub fn parse_as(kind: SettingKind, input: &str) -> Result<Self> {
        let input = input.trim();
        match kind {
            SettingKind::Integer => input
                .parse::<i64>()
                .map(SettingValue::Integer)
                .map_err(|_| ImagineError::validation("Please enter an integer.")),
            SettingKind::Float => input
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .map(SettingValue::Float)
                .ok_or_else(|| ImagineError::validation("Please enter a float.")),
            SettingKind::Boolean => match input.to_ascii_lowercase().as_str() {
                "true" | "yes" | "y" | "on" => Ok(SettingValue::Boolean(true)),
                "false" | "no" | "n" | "off" => Ok(SettingValue::Boolean(false)),
                _ => Err(ImagineError::validation("Please enter yes or no.")),
            },
            SettingKind::Text => Ok(SettingValue::Text(input.to_string())),
        }
    }
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingValue::Boolean(v) => write!(f, "{v}"),
            SettingValue::Integer(v) => write!(f, "{v}"),
            SettingValue::Float(v) => write!(f, "{v}"),
            SettingValue::Text(v) => write!(f, "{v}"),
        }
    }
}

/// One configuration rule as stored in the settings file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Setting {
    pub value: SettingValue,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_value: Option<SettingValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_value: Option<SettingValue>,
}

impl Setting {
    pub fn new(value: SettingValue, description: impl Into<String>) -> Self {
        Self {
            value,
            description: description.into(),
            min_value: None,
            max_value: None,
        }
    }

    pub fn with_bounds(mut self, min: SettingValue, max: SettingValue) -> Self {
        self.min_value = Some(min);
        self.max_value = Some(max);
        self
    }

    pub fn kind(&self) -> SettingKind {
        self.value.kind()
    }

    pub(crate) fn below_min(&self, value: &SettingValue) -> bool {
        match (value.as_f64(), self.min_value.as_ref().and_then(SettingValue::as_f64)) {
            (Some(v), Some(min)) => v < min,
            _ => false,
        }
    }

    pub(crate) fn above_max(&self, value: &SettingValue) -> bool {
        match (value.as_f64(), self.max_value.as_ref().and_then(SettingValue::as_f64)) {
            (Some(v), Some(max)) => v > max,
            _ => false,
        }
    }
}

/// The reconciled settings document, ordered by the canonical schema.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Settings {
    entries: Vec<(String, Setting)>,
}

impl Settings {
    pub(crate) fn from_entries(entries: Vec<(String, Setting)>) -> Self {
        Self { entries }
    }

    pub fn get(&self, key: &str) -> Option<&Setting> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, setting)| setting)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Setting)> {
        self.entries.iter().map(|(k, s)| (k.as_str(), s))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Converts to the persisted document shape (`{ KEY = { value, description, ... } }`).
    pub fn to_document(&self) -> Result<JsonValue> {
        let mut map = Map::new();
        for (key, setting) in &self.entries {
            map.insert(key.clone(), serde_json::to_value(setting)?);
        }
        Ok(JsonValue::Object(map))
    }

    /// Checks a candidate value for `key` against the schema and the current value.
    pub fn validate_edit(
        &self,
        schema: &SettingsSchema,
        key: &str,
        candidate: &SettingValue,
    ) -> Result<()> {
        let rule = schema
            .get(key)
            .ok_or_else(|| ImagineError::not_found("setting", key))?;
        let canonical = &rule.default;

        if candidate.kind() != canonical.kind() {
            return Err(ImagineError::validation(format!(
                "Rule '{key}' expects a {} value.",
                canonical.kind()
            )));
        }
        if canonical.below_min(candidate) {
            return Err(ImagineError::validation(
                "New value is too low for this ruleset.",
            ));
        }
        if canonical.above_max(candidate) {
            return Err(ImagineError::validation(
                "New value is too high for this ruleset.",
            ));
        }
        if let SettingValue::Text(text) = candidate {
            if text.chars().count() < MIN_TEXT_LENGTH {
                return Err(ImagineError::validation(format!(
                    "Values must be a minimum of length {MIN_TEXT_LENGTH} for this ruleset."
                )));
            }
        }
        if self.get(key).map(|s| &s.value) == Some(candidate) {
            return Err(ImagineError::validation(
                "Entered value isn't different from current value!",
            ));
        }
        Ok(())
    }

    /// Returns a copy with `key` set to `value`. Unknown keys are left untouched.
    pub fn with_value(&self, key: &str, value: SettingValue) -> Self {
        let mut next = self.clone();
        if let Some((_, setting)) = next.entries.iter_mut().find(|(k, _)| k == key) {
            setting.value = value;
        }
        next
    }

    fn integer_or(&self, key: &str, fallback: i64) -> i64 {
        self.get(key)
            .and_then(|s| s.value.as_i64())
            .unwrap_or(fallback)
    }

    /// Images rendered per batch.
    pub fn batch_size(&self) -> u32 {
        u32::try_from(self.integer_or(BATCH_SIZE, DEFAULT_BATCH_SIZE)).unwrap_or(1).max(1)
    }

    /// Upper limit for the image count of one request.
    pub fn max_images(&self) -> u32 {
        u32::try_from(self.integer_or(MAX_IMAGES, DEFAULT_MAX_IMAGES)).unwrap_or(1).max(1)
    }

    /// Delay inserted between batches.
    pub fn batch_timeout(&self) -> Duration {
        let secs = self.integer_or(BATCH_TIMEOUT, DEFAULT_BATCH_TIMEOUT_SECS);
        Duration::from_secs(u64::try_from(secs).unwrap_or(0))
    }

    pub fn always_verify_keys(&self) -> bool {
        self.get(ALWAYS_VERIFY_KEYS)
            .and_then(|s| s.value.as_bool())
            .unwrap_or(DEFAULT_ALWAYS_VERIFY_KEYS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_untagged_value_keeps_integer_and_float_apart() {
        let int: SettingValue = serde_json::from_value(serde_json::json!(3)).unwrap();
        let float: SettingValue = serde_json::from_value(serde_json::json!(3.0)).unwrap();
        let flag: SettingValue = serde_json::from_value(serde_json::json!(true)).unwrap();
        assert_eq!(int.kind(), SettingKind::Integer);
        assert_eq!(float.kind(), SettingKind::Float);
        assert_eq!(flag.kind(), SettingKind::Boolean);
    }

    #[test]
    fn test_parse_as_rejects_wrong_input() {
        assert!(SettingValue::parse_as(SettingKind::Integer, "abc").is_err());
        assert_eq!(
            SettingValue::parse_as(SettingKind::Integer, " 7 ").unwrap(),
            SettingValue::Integer(7)
        );
        assert!(SettingValue::parse_as(SettingKind::Float, "NaN").is_err());
        assert_eq!(
            SettingValue::parse_as(SettingKind::Boolean, "Yes").unwrap(),
            SettingValue::Boolean(true)
        );
    }

    #[test]
    fn test_validate_edit() {
        let schema = SettingsSchema::canonical();
        let settings = schema.default_settings();

        assert!(settings
            .validate_edit(&schema, BATCH_SIZE, &SettingValue::Integer(5))
            .is_ok());
        // unchanged
        assert!(settings
            .validate_edit(&schema, BATCH_SIZE, &SettingValue::Integer(DEFAULT_BATCH_SIZE))
            .is_err());
        // out of bounds
        assert!(settings
            .validate_edit(&schema, BATCH_SIZE, &SettingValue::Integer(0))
            .is_err());
        assert!(settings
            .validate_edit(&schema, BATCH_SIZE, &SettingValue::Integer(11))
            .is_err());
        // wrong type
        assert!(settings
            .validate_edit(&schema, BATCH_SIZE, &SettingValue::Float(2.0))
            .is_err());
        // unknown key
        assert!(settings
            .validate_edit(&schema, "NOPE", &SettingValue::Integer(2))
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn test_typed_accessors() {
        let schema = SettingsSchema::canonical();
        let settings = schema
            .default_settings()
            .with_value(BATCH_TIMEOUT, SettingValue::Integer(10));
        assert_eq!(settings.batch_size(), 3);
        assert_eq!(settings.max_images(), 30);
        assert_eq!(settings.batch_timeout(), Duration::from_secs(10));
        assert!(!settings.always_verify_keys());
    }

    #[test]
    fn test_document_omits_absent_bounds() {
        let settings = SettingsSchema::canonical().default_settings();
        let doc = settings.to_document().unwrap();
        assert!(doc[ALWAYS_VERIFY_KEYS].get("min_value").is_none());
        assert_eq!(doc[BATCH_SIZE]["max_value"], 10);
    }
}
