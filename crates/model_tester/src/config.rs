//! Configuration management for the model tester.
//!
//! The tester's own settings live in a TOML file, separate from the `.cfg`
//! settings files the models are bound to.

use anyhow::Context;
use config_store::ConfigDefinition;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

fn default_save_on_set() -> bool {
    true
}

fn default_array_size() -> usize {
    20
}

fn default_array_section() -> String {
    "arraytest".to_string()
}

fn default_file_model_sections() -> Vec<String> {
    vec!["TestSection".to_string(), "TestSection2".to_string(), "TestSection3".to_string()]
}

/// Tester configuration loaded from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TesterConfig {
    pub logging: LoggingSettings,
    pub store: StoreSettings,
    #[serde(default)]
    pub models: ModelSettings,
}

/// Logging system configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level filter (trace, debug, info, warn, error)
    pub level: String,
    /// Whether to output logs in JSON format
    pub json_format: bool,
}

/// Where the bound settings files live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSettings {
    /// Settings file every model binds to first
    pub path: PathBuf,
    /// Settings file the declarative example switches to
    pub profile_path: PathBuf,
    /// Name written in the settings file header
    pub owner: String,
    /// Whether every change is written to disk immediately
    #[serde(default = "default_save_on_set")]
    pub save_on_set: bool,
    /// Keep everything in memory
    #[serde(default)]
    pub in_memory: bool,
}

/// Sections and sizes used when binding the test models.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSettings {
    /// Sections the attribute-driven test model is bound under, one bind each
    #[serde(default = "default_file_model_sections")]
    pub file_model_sections: Vec<String>,
    /// Overrides the section the declarative example picks for itself
    #[serde(default)]
    pub example_section: Option<String>,
    #[serde(default = "default_array_section")]
    pub array_section: String,
    #[serde(default = "default_array_size")]
    pub array_size: usize,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            file_model_sections: default_file_model_sections(),
            example_section: None,
            array_section: default_array_section(),
            array_size: default_array_size(),
        }
    }
}

impl Default for TesterConfig {
    fn default() -> Self {
        Self {
            logging: LoggingSettings {
                level: "info".to_string(),
                json_format: false,
            },
            store: StoreSettings {
                path: PathBuf::from("model_tester.cfg"),
                profile_path: PathBuf::from("model_tester_profile2.cfg"),
                owner: "model_tester".to_string(),
                save_on_set: true,
                in_memory: false,
            },
            models: ModelSettings::default(),
        }
    }
}

impl TesterConfig {
    /// Loads configuration from a TOML file.
    ///
    /// If the file doesn't exist, a default configuration is written to
    /// `path` and returned.
    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content =
                std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
            let config: TesterConfig =
                toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
            Ok(config)
        } else {
            let default_config = TesterConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            std::fs::write(path, toml_content).with_context(|| format!("writing {}", path.display()))?;
            info!("Created default configuration file: {}", path.display());
            Ok(default_config)
        }
    }

    /// Validates the configuration for consistency and correctness.
    pub fn validate(&self) -> Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(format!(
                "Invalid log level: {}. Must be one of: {valid_levels:?}",
                &self.logging.level
            ));
        }

        if !self.store.in_memory {
            if self.store.path.as_os_str().is_empty() {
                return Err("Store path cannot be empty".to_string());
            }
            if self.store.path == self.store.profile_path {
                return Err("Store path and profile path must differ".to_string());
            }
        }

        if self.store.owner.trim().is_empty() {
            return Err("Store owner cannot be empty".to_string());
        }

        if self.models.array_size == 0 {
            return Err("models.array_size must be greater than 0".to_string());
        }

        let sections = self
            .models
            .file_model_sections
            .iter()
            .chain(self.models.example_section.iter())
            .chain(std::iter::once(&self.models.array_section));
        for section in sections {
            ConfigDefinition::new(section, "probe").map_err(|e| format!("Invalid section name: {e}"))?;
        }

        Ok(())
    }
}
