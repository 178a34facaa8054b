//! Layered error definitions
//!
//! Categorized by source: config / device / tracker

use thiserror::Error;

/// Configuration error
#[derive(Debug, Error)]
pub enum ContractError {
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

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
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
}

/// Hardware-boundary error
///
/// Returned by `DeviceDriver`, `DepthCamera`, `TrackerEngine` and `BodyTracker`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeviceError {
    // ===== Open / configure =====
    /// Zero devices enumerated
    #[error("no depth camera device found")]
    NoDeviceFound,

    /// Device exists but cannot be opened
    #[error("device {index} unavailable: {message}")]
    DeviceUnavailable { index: u32, message: String },

    /// Camera rejected the requested mode combination
    #[error("invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    // ===== Streaming =====
    /// No capture arrived within the wait bound
    #[error("capture timed out after {waited_ms}ms")]
    CaptureTimeout { waited_ms: u64 },

    /// Tracker input queue is full
    #[error("tracker input queue full")]
    QueueFull,

    /// Handle was already closed
    #[error("{resource} handle already disposed")]
    Disposed { resource: String },

    /// Request not supported in the current mode
    #[error("unsupported: {message}")]
    Unsupported { message: String },

    /// Any other hardware or driver fault
    #[error("hardware error: {message}")]
    Hardware { message: String },
}

impl DeviceError {
    pub fn device_unavailable(index: u32, message: impl Into<String>) -> Self {
        Self::DeviceUnavailable {
            index,
            message: message.into(),
        }
    }

    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            message: message.into(),
        }
    }

    pub fn disposed(resource: impl Into<String>) -> Self {
        Self::Disposed {
            resource: resource.into(),
        }
    }

    pub fn hardware(message: impl Into<String>) -> Self {
        Self::Hardware {
            message: message.into(),
        }
    }

    /// Timeouts are retried by the producer
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::CaptureTimeout { .. })
    }

    /// A closed handle, expected while a session is being torn down
    pub fn is_disposed(&self) -> bool {
        matches!(self, Self::Disposed { .. })
    }
}
