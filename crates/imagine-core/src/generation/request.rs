//! Validated inputs of a generation request.

use crate::error::{ImagineError, Result};

/// Minimum length of prompts and generation titles.
pub const MIN_INPUT_LENGTH: usize = 3;

/// A model parameter with the value chosen for this request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedParameter {
    pub name: String,
    pub alias: String,
    pub value: String,
}

/// Ordered set of resolved parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationParameters {
    entries: Vec<ResolvedParameter>,
}

impl GenerationParameters {
    pub fn new(entries: Vec<ResolvedParameter>) -> Self {
        Self { entries }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResolvedParameter> {
        self.entries.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Trims and checks a prompt.
pub fn validate_prompt(prompt: &str) -> Result<String> {
    let prompt = prompt.trim();
    if prompt.chars().count() < MIN_INPUT_LENGTH {
        return Err(ImagineError::validation(format!(
            "Prompt must have a length of at least {MIN_INPUT_LENGTH}."
        )));
    }
    Ok(prompt.to_string())
}

/// Parses and range-checks a requested image count against `max_images`.
pub fn validate_image_count(input: &str, max_images: u32) -> Result<u32> {
    let count: u32 = input
        .trim()
        .parse()
        .map_err(|_| ImagineError::validation("Please enter an integer."))?;
    if count == 0 || count > max_images {
        return Err(ImagineError::validation(format!(
            "Value not in range 1-{max_images}."
        )));
    }
    Ok(count)
}
