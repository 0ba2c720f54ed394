//! Self-healing reconciliation of a persisted settings document.
//!
//! The persisted document is untrusted: it may be missing, unparsable, partially
//! written or produced by an older release. Reconciliation walks the canonical
//! schema (not the persisted keys) and repairs every deviation, so the result
//! always matches the schema's types and bounds.

use serde_json::{Map, Value as JsonValue};
use std::fmt;

use super::model::{Setting, SettingValue, Settings};
use super::schema::{SettingRule, SettingsSchema};

/// What was found on disk before reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub enum PersistedSettings {
    /// No settings file exists.
    Missing,
    /// The file exists but could not be parsed.
    Corrupted(String),
    /// The file parsed into a structured value.
    Loaded(JsonValue),
}

/// A single repair applied during reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Repair {
    FileMissing,
    FileCorrupted,
    RuleMissing(String),
    RuleCorrupted(String),
    ValueType(String),
    Description(String),
    MinBound(String),
    MaxBound(String),
    BelowMinimum(String),
    AboveMaximum(String),
}

impl fmt::Display for Repair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Repair::FileMissing => write!(f, "Missing config file. Creating new config file."),
            Repair::FileCorrupted => write!(f, "Config file corrupted! Restoring to default."),
            Repair::RuleMissing(key) => {
                write!(f, "Config rule '{key}' missing! Restoring to default.")
            }
            Repair::RuleCorrupted(key) => {
                write!(f, "Config rule '{key}' corrupted! Restoring to default.")
            }
            Repair::ValueType(key) => {
                write!(f, "Config rule '{key}'s value is corrupted! Restoring to default.")
            }
            Repair::Description(key) => write!(
                f,
                "Config rule '{key}'s description is corrupted! Restoring to default."
            ),
            Repair::MinBound(key) => write!(
                f,
                "Config rule '{key}'s minimum value is corrupted! Restoring to default."
            ),
            Repair::MaxBound(key) => write!(
                f,
                "Config rule '{key}'s maximum value is corrupted! Restoring to default."
            ),
            Repair::BelowMinimum(key) => write!(
                f,
                "Config rule '{key}'s value is below minimum! Restoring to default."
            ),
            Repair::AboveMaximum(key) => write!(
                f,
                "Config rule '{key}'s value is above maximum! Restoring to default."
            ),
        }
    }
}

/// Result of [`reconcile`].
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled {
    pub settings: Settings,
    /// True when any repair was applied.
    pub changed: bool,
    pub repairs: Vec<Repair>,
    /// Persisted keys unknown to the schema; removed without counting as a change.
    pub dropped_keys: Vec<String>,
}

/// Marker for an entry too malformed to repair field by field.
struct MalformedEntry;

/// Reconciles a persisted document against `schema`.
///
/// Persisting the returned settings is the caller's job and should happen even
/// when nothing changed.
pub fn reconcile(schema: &SettingsSchema, persisted: &PersistedSettings) -> Reconciled {
    let document = match persisted {
        PersistedSettings::Missing => return reset(schema, Repair::FileMissing),
        PersistedSettings::Corrupted(reason) => {
            tracing::debug!(%reason, "settings file could not be parsed");
            return reset(schema, Repair::FileCorrupted);
        }
        PersistedSettings::Loaded(JsonValue::Object(map)) => map,
        PersistedSettings::Loaded(_) => return reset(schema, Repair::FileCorrupted),
    };

    let mut repairs = Vec::new();
    let mut entries = Vec::with_capacity(schema.rules().len());

    for rule in schema.rules() {
        let setting = match document.get(&rule.key) {
            None => {
                repairs.push(Repair::RuleMissing(rule.key.clone()));
                rule.default.clone()
            }
            Some(entry) => match repair_entry(rule, entry, &mut repairs) {
                Ok(setting) => setting,
                Err(MalformedEntry) => {
                    repairs.push(Repair::RuleCorrupted(rule.key.clone()));
                    rule.default.clone()
                }
            },
        };
        entries.push((rule.key.clone(), setting));
    }

    let dropped_keys = stale_keys(schema, document);

    Reconciled {
        settings: Settings::from_entries(entries),
        changed: !repairs.is_empty(),
        repairs,
        dropped_keys,
    }
}

fn reset(schema: &SettingsSchema, repair: Repair) -> Reconciled {
    Reconciled {
        settings: schema.default_settings(),
        changed: true,
        repairs: vec![repair],
        dropped_keys: Vec::new(),
    }
}

fn stale_keys(schema: &SettingsSchema, document: &Map<String, JsonValue>) -> Vec<String> {
    document
        .keys()
        .filter(|key| !schema.contains(key))
        .cloned()
        .collect()
}

/// Repairs one entry field by field.
///
/// Fields repairs are collected into a local list first so that an entry which
/// turns out to be malformed half way through is reported once, as corrupted.
fn repair_entry(
    rule: &SettingRule,
    entry: &JsonValue,
    repairs: &mut Vec<Repair>,
) -> Result<Setting, MalformedEntry> {
    let canonical = &rule.default;
    let key = &rule.key;
    let fields = entry.as_object().ok_or(MalformedEntry)?;
    let mut local = Vec::new();

    let raw_value = fields.get("value").ok_or(MalformedEntry)?;
    let mut value = match serde_json::from_value::<SettingValue>(raw_value.clone()) {
        Ok(value) if value.kind() == canonical.kind() => value,
        _ => {
            local.push(Repair::ValueType(key.clone()));
            canonical.value.clone()
        }
    };

    let raw_description = fields.get("description").ok_or(MalformedEntry)?;
    if raw_description.as_str() != Some(canonical.description.as_str()) {
        local.push(Repair::Description(key.clone()));
    }

    let min_value = repair_bound(
        canonical.min_value.as_ref(),
        fields.get("min_value"),
        Repair::MinBound(key.clone()),
        &mut local,
    )?;
    if canonical.below_min(&value) {
        local.push(Repair::BelowMinimum(key.clone()));
        value = canonical.value.clone();
    }

    let max_value = repair_bound(
        canonical.max_value.as_ref(),
        fields.get("max_value"),
        Repair::MaxBound(key.clone()),
        &mut local,
    )?;
    if canonical.above_max(&value) {
        local.push(Repair::AboveMaximum(key.clone()));
        value = canonical.value.clone();
    }

    repairs.extend(local);
    Ok(Setting {
        value,
        description: canonical.description.clone(),
        min_value,
        max_value,
    })
}

/// Bounds are schema-owned: a declared bound must be present and equal, an
/// undeclared bound must be absent.
fn repair_bound(
    canonical: Option<&SettingValue>,
    persisted: Option<&JsonValue>,
    repair: Repair,
    local: &mut Vec<Repair>,
) -> Result<Option<SettingValue>, MalformedEntry> {
    match (canonical, persisted) {
        (Some(_), None) => Err(MalformedEntry),
        (Some(expected), Some(raw)) => {
            let matches = serde_json::from_value::<SettingValue>(raw.clone())
                .map(|found| &found == expected)
                .unwrap_or(false);
            if !matches {
                local.push(repair);
            }
            Ok(Some(expected.clone()))
        }
        (None, Some(_)) => {
            local.push(repair);
            Ok(None)
        }
        (None, None) => Ok(None),
    }
}
