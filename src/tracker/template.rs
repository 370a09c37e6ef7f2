//! JSON payload templates with `%SUMMARY%` / `%DESCRIPTION%` placeholders.
//!
//! Templates come from deployment configuration so the tracker's project,
//! issue type and custom fields stay outside the code.

use std::path::Path;

use crate::error::ConfigError;
use crate::sync::sanitizer::json_escape;

pub const SUMMARY_PLACEHOLDER: &str = "%SUMMARY%";
pub const DESCRIPTION_PLACEHOLDER: &str = "%DESCRIPTION%";

/// A request body template. Placeholders sit inside JSON string literals.
#[derive(Debug, Clone)]
pub struct PayloadTemplate {
    text: String,
}

impl PayloadTemplate {
    /// Build a template from text. Both placeholders must be present and
    /// their first occurrences must not share characters.
    pub fn new(text: impl Into<String>) -> Result<Self, ConfigError> {
        let text = text.into();
        let invalid = |message: String| ConfigError::InvalidValue {
            key: "template".into(),
            message,
        };

        let mut spans = Vec::with_capacity(2);
        for placeholder in [SUMMARY_PLACEHOLDER, DESCRIPTION_PLACEHOLDER] {
            let start = text
                .find(placeholder)
                .ok_or_else(|| invalid(format!("missing placeholder {placeholder}")))?;
            spans.push(start..start + placeholder.len());
        }
        if spans[0].start < spans[1].end && spans[1].start < spans[0].end {
            return Err(invalid(format!(
                "placeholders {SUMMARY_PLACEHOLDER} and {DESCRIPTION_PLACEHOLDER} overlap"
            )));
        }

        Ok(Self { text })
    }

    /// Read a template file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::new(text).map_err(|e| match e {
            ConfigError::InvalidValue { message, .. } => ConfigError::InvalidValue {
                key: path.display().to_string(),
                message,
            },
            other => other,
        })
    }

    /// Substitute the first occurrence of each placeholder with the
    /// JSON-escaped value. The description is trimmed first.
    ///
    /// Positions are taken from the template itself, so placeholder text
    /// inside a substituted value is never expanded.
    pub fn render(&self, summary: &str, description: &str) -> String {
        let mut slots: Vec<(usize, &str, String)> = Vec::with_capacity(2);
        if let Some(pos) = self.text.find(SUMMARY_PLACEHOLDER) {
            slots.push((pos, SUMMARY_PLACEHOLDER, json_escape(summary)));
        }
        if let Some(pos) = self.text.find(DESCRIPTION_PLACEHOLDER) {
            slots.push((pos, DESCRIPTION_PLACEHOLDER, json_escape(description.trim())));
        }
        slots.sort_by_key(|(pos, _, _)| *pos);

        let mut out = String::with_capacity(self.text.len() + summary.len() + description.len());
        let mut cursor = 0;
        for (pos, placeholder, value) in slots {
            out.push_str(&self.text[cursor..pos]);
            out.push_str(&value);
            cursor = pos + placeholder.len();
        }
        out.push_str(&self.text[cursor..]);
        out
    }
}
