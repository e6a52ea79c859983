//! Error types for zx3dl-core

use thiserror::Error;

/// Result type alias using zx3dl-core's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for zx3dl
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Invalid configuration format or value
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    YamlParse(#[from] serde_yaml_ng::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Unknown FPGA kind
    #[error("Unknown FPGA kind: {value}. Valid kinds: a35t, a100t, a200t")]
    InvalidKind { value: String },

    /// Unknown core type
    #[error("Unknown core type: {value}. Valid types: bit, zx3")]
    InvalidCoreType { value: String },

    /// Unknown tag
    #[error("Unknown tag: {value}. Valid tags: arcade, console, computer, util")]
    InvalidTag { value: String },

    /// Unknown checksum algorithm
    #[error("Unknown checksum algorithm: {value}")]
    InvalidChecksum { value: String },

    /// A selection list ended up empty after dropping invalid values
    #[error("No valid {field} selected")]
    EmptySelection { field: String },
}

impl Error {
    /// Create a config not found error
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    /// Create an invalid config error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create an invalid kind error
    pub fn invalid_kind(value: impl Into<String>) -> Self {
        Self::InvalidKind {
            value: value.into(),
        }
    }

    /// Create an invalid core type error
    pub fn invalid_core_type(value: impl Into<String>) -> Self {
        Self::InvalidCoreType {
            value: value.into(),
        }
    }

    /// Create an invalid tag error
    pub fn invalid_tag(value: impl Into<String>) -> Self {
        Self::InvalidTag {
            value: value.into(),
        }
    }

    /// Create an empty selection error
    pub fn empty_selection(field: impl Into<String>) -> Self {
        Self::EmptySelection {
            field: field.into(),
        }
    }
}
