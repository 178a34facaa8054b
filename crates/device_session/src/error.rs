//! Device Session error types

use acquisition::AcquisitionError;
use contracts::DeviceError;
use thiserror::Error;

/// Device Session specific error
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    /// `start` called while the session is not stopped
    #[error("session already started; call stop() first")]
    AlreadyStarted,

    /// Hardware refused during start (no device, unavailable, bad config, ...)
    #[error(transparent)]
    Device(#[from] DeviceError),

    /// Producer loop terminated with an unrecoverable failure
    #[error("producer failed: {0}")]
    Producer(#[from] AcquisitionError),

    /// Producer thread could not be spawned
    #[error("failed to spawn producer thread: {message}")]
    Spawn { message: String },
}

impl SessionError {
    pub fn spawn(message: impl Into<String>) -> Self {
        Self::Spawn {
            message: message.into(),
        }
    }

    /// Underlying hardware error, if any
    pub fn device_error(&self) -> Option<&DeviceError> {
        match self {
            Self::Device(e) => Some(e),
            Self::Producer(e) => e.device_error(),
            _ => None,
        }
    }
}

/// Device Session Result type
pub type Result<T> = std::result::Result<T, SessionError>;
