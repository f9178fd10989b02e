//! Identity and metadata of a single setting.

use crate::acceptable::AcceptableValues;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;

const FORBIDDEN_CHARS: &[char] = &['=', '\n', '\t', '\r', '\\', '"', '\'', '[', ']'];

/// Section and key that identify a setting inside a [`ConfigFile`](crate::ConfigFile).
///
/// Definitions order by section first, then key, which is also the order
/// settings are written to disk.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConfigDefinition {
    pub section: String,
    pub key: String,
}

impl ConfigDefinition {
    pub fn new(section: impl Into<String>, key: impl Into<String>) -> Result<Self, ConfigError> {
        let section = section.into();
        let key = key.into();
        validate_name("section", &section)?;
        validate_name("key", &key)?;
        Ok(Self { section, key })
    }
}

impl fmt::Display for ConfigDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.section, self.key)
    }
}

fn validate_name(field: &'static str, name: &str) -> Result<(), ConfigError> {
    let reason = if name.is_empty() {
        Some("name is empty")
    } else if name.trim() != name {
        Some("name has leading or trailing whitespace")
    } else if name.contains(FORBIDDEN_CHARS) {
        Some("name contains one of = \\n \\t \\r \\\\ \" ' [ ]")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(ConfigError::InvalidName {
            field,
            name: name.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

/// Human-facing metadata attached to a setting.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigDescription<T> {
    pub description: String,
    pub acceptable_values: Option<AcceptableValues<T>>,
    /// Opaque annotations for downstream consumers such as a settings UI.
    pub tags: Vec<serde_json::Value>,
}

impl<T> ConfigDescription<T> {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            acceptable_values: None,
            tags: Vec::new(),
        }
    }

    pub fn with_acceptable_values(mut self, acceptable: Option<AcceptableValues<T>>) -> Self {
        self.acceptable_values = acceptable;
        self
    }

    pub fn with_tags(mut self, tags: Vec<serde_json::Value>) -> Self {
        self.tags = tags;
        self
    }
}

impl<T> Default for ConfigDescription<T> {
    fn default() -> Self {
        Self::new(String::new())
    }
}
