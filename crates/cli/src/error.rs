//! Error types for CLI operations.

use contracts::ContractError;
use device_session::SessionError;
use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Configuration parse or validation error
    #[error("Invalid configuration: {0}")]
    Config(#[from] ContractError),

    /// Device session error
    #[error("Device session error: {0}")]
    Session(#[from] SessionError),
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }
}
