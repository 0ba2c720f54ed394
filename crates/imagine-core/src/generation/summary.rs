//! The human-readable `settings.txt` written into every generation record.

use chrono::{DateTime, Local};

use super::request::GenerationParameters;

/// Timestamp format used for summaries and default record titles.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H-%M-%S";

/// Formats `time` the way record titles and summaries expect.
pub fn format_timestamp(time: DateTime<Local>) -> String {
    time.format(TIMESTAMP_FORMAT).to_string()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationSummary {
    pub prompt: String,
    pub timestamp: String,
    pub model_alias: String,
    pub image_count: u32,
    pub parameters: GenerationParameters,
}

impl GenerationSummary {
    pub fn render(&self) -> String {
        let mut text = format!(
            "Generation Settings\n\nPrompt: {}\nTimestamp: {}\nModel: {}\nImage Amount: {}",
            self.prompt, self.timestamp, self.model_alias, self.image_count
        );
        for parameter in self.parameters.iter() {
            text.push_str(&format!("\n{}: {}", parameter.alias, parameter.value));
        }
        text
    }
}
