use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML configuration: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Configuration value '{key}' has a circular placeholder reference: {}", chain.join(" -> "))]
    CircularReference { key: String, chain: Vec<String> },

    #[error("Placeholder '${name}' in configuration value '{key}' is neither a known configuration value nor an environment variable.")]
    UnresolvedPlaceholder { key: String, name: String },

    #[error("Configuration value '{0}' is not defined in any layer.")]
    MissingKey(String),

    #[error("Settings file not found at '{0}'.\nCreate one or point strand at it with --settings. A minimal file needs at least a [backend] id.")]
    SettingsNotFound(PathBuf),

    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    #[error("Invalid configuration: {0}")]
    General(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
