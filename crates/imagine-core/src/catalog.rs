//! Static description of the supported services, their models and the
//! additional parameters each model accepts.

use crate::error::{ImagineError, Result};
use crate::generation::ResolvedParameter;
use std::fmt;

/// Identifier of an image generation service.
///
/// The key doubles as the credential file key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ServiceId {
    OpenAi,
    StabilityAi,
}

impl ServiceId {
    /// All services, in display order.
    pub const ALL: [ServiceId; 2] = [ServiceId::OpenAi, ServiceId::StabilityAi];

    pub fn key(self) -> &'static str {
        match self {
            ServiceId::OpenAi => "OPENAI",
            ServiceId::StabilityAi => "STABILITYAI",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|id| id.key() == key)
    }

    /// Credential keys of every known service.
    pub fn known_keys() -> Vec<&'static str> {
        Self::ALL.iter().map(|id| id.key()).collect()
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// One user-selectable option of a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParameterSpec {
    pub name: &'static str,
    pub alias: &'static str,
    pub description: &'static str,
    pub default: &'static str,
    pub options: &'static [&'static str],
}

impl ParameterSpec {
    /// Resolves a user choice; `None` or blank selects the default.
    pub fn resolve(&self, choice: Option<&str>) -> Result<ResolvedParameter> {
        let value = match choice.map(str::trim).filter(|c| !c.is_empty()) {
            None => self.default,
            Some(choice) => self
                .options
                .iter()
                .copied()
                .find(|option| *option == choice)
                .ok_or_else(|| {
                    ImagineError::validation(format!(
                        "'{choice}' is not a valid option for {}. Options: {}",
                        self.alias,
                        self.options.join(", ")
                    ))
                })?,
        };
        Ok(ResolvedParameter {
            name: self.name.to_string(),
            alias: self.alias.to_string(),
            value: value.to_string(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelSpec {
    pub name: &'static str,
    pub alias: &'static str,
    pub online_only: bool,
    pub description: &'static str,
    pub parameters: &'static [ParameterSpec],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceSpec {
    pub id: ServiceId,
    pub alias: &'static str,
    pub description: &'static str,
    pub link: &'static str,
    /// The user is asked for this key at startup when it is missing.
    pub required: bool,
    /// Keys for this service are always verified before saving.
    pub always_verify: bool,
    pub models: &'static [ModelSpec],
}

impl ServiceSpec {
    pub fn model(&self, name: &str) -> Option<&'static ModelSpec> {
        self.models.iter().find(|model| model.name == name)
    }

    /// Comma separated model aliases, for menus.
    pub fn model_aliases(&self) -> String {
        self.models
            .iter()
            .map(|model| model.alias)
            .collect::<Vec<_>>()
            .join(", ")
    }
}
