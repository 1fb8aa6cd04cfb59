//! Dispatcher error types

use thiserror::Error;

/// Dispatcher-specific errors
///
/// Per-record upload failures never surface here; they are accounted in the
/// `DispatchReport`. These errors abort a run before any batch is formed.
#[derive(Debug, Error)]
pub enum DispatcherError {
    /// Invalid dispatch configuration
    #[error("config error: {0}")]
    Config(#[from] contracts::ContractError),

    /// No api registered under this name
    #[error("api not supported: {name}")]
    UnsupportedApi { name: String },

    /// Uploader creation error
    #[error("failed to create uploader '{name}': {message}")]
    UploaderCreation { name: String, message: String },

    /// Concurrency gate closed while waiting for a slot
    #[error("concurrency gate closed")]
    GateClosed,

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl DispatcherError {
    /// Create an uploader creation error
    pub fn uploader_creation(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::UploaderCreation {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Whether the run was rejected because of its configuration
    pub fn is_config(&self) -> bool {
        match self {
            Self::Config(e) => e.is_config(),
            _ => false,
        }
    }
}
