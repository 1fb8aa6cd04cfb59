//! Layered error definitions
//!
//! Categorized by source: config / api / uploader

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== API Errors =====
    /// No api registered under this name
    #[error("api not supported: {name}")]
    UnsupportedApi { name: String },

    // ===== Uploader Errors =====
    /// Uploader could not be constructed from its params
    #[error("uploader '{name}' setup error: {message}")]
    UploaderSetup { name: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create uploader setup error
    pub fn uploader_setup(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::UploaderSetup {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Whether this error is a configuration problem (fatal before any work)
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Self::ConfigParse { .. } | Self::ConfigValidation { .. }
        )
    }
}
