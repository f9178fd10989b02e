use config_store::{ConfigDefinition, ConfigError};
use thiserror::Error;

/// Errors raised while binding a member or model to a settings file.
#[derive(Error, Debug)]
pub enum BindError {
    #[error("No settings file to bind to")]
    NoConfigFile,

    /// The wrapper is bound to another file; unbind it or switch profiles first.
    #[error("{definition} is already bound to a different settings file")]
    AlreadyBound { definition: ConfigDefinition },

    #[error("Member '{member}' was never initialized")]
    Uninitialized { member: String },

    #[error("Binding panicked: {0}")]
    Panicked(String),

    #[error("Store error: {0}")]
    Store(#[from] ConfigError),
}
