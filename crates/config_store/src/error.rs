//! Error types for the settings store.

use crate::definition::ConfigDefinition;
use thiserror::Error;

/// Errors raised by [`ConfigFile`](crate::ConfigFile) operations.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A section or key contains characters the file format cannot represent.
    #[error("Invalid {field} name '{name}': {reason}")]
    InvalidName {
        field: &'static str,
        name: String,
        reason: &'static str,
    },

    /// The definition is already bound with a different value type.
    #[error("Setting {definition} is bound as {existing}, not {requested}")]
    TypeMismatch {
        definition: ConfigDefinition,
        existing: &'static str,
        requested: &'static str,
    },

    /// The file was created in memory and has nowhere to load from or save to.
    #[error("Settings file has no path")]
    NoPath,

    /// A stored text value could not be read back as its setting type.
    #[error(transparent)]
    Conversion(#[from] ConversionError),

    /// IO error while reading or writing the settings file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A value could not be converted into the requested setting type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Cannot convert '{value}' to {target}: {reason}")]
pub struct ConversionError {
    pub value: String,
    pub target: &'static str,
    pub reason: String,
}

impl ConversionError {
    pub fn new(value: impl ToString, target: &'static str, reason: impl Into<String>) -> Self {
        Self {
            value: value.to_string(),
            target,
            reason: reason.into(),
        }
    }
}
