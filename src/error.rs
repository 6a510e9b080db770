//! # Error Types
//!
//! Custom error types for ROV Pilot using `thiserror`.

use std::time::Duration;
use thiserror::Error;

/// Main error type for ROV Pilot
#[derive(Debug, Error)]
pub enum RovPilotError {
    /// Source range of an affine remap has zero width
    #[error("Degenerate range: [{min}, {max}] has zero width")]
    DegenerateRange { min: f32, max: f32 },

    /// Persisted profile is missing fields or unparsable
    #[error("Corrupt profile: {0}")]
    CorruptProfile(String),

    /// Profile name is empty or would escape the profile directory
    #[error("Invalid profile name '{0}'")]
    InvalidProfileName(String),

    /// Save requested on a frame that was built without a profile store
    #[error("Thruster profile '{0}' cannot be saved: no profile store")]
    NoProfileStore(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Link payload serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Controller device errors
    #[error("Controller error: {0}")]
    Controller(String),

    /// No supported gamepad was found
    #[error("No supported gamepad found under /dev/input")]
    ControllerNotFound,

    /// The controller reader stopped delivering samples
    #[error("Controller disconnected")]
    ControllerDisconnected,

    /// Link I/O failures
    #[error("Transport error: {0}")]
    Transport(String),

    /// No endpoint accepted a connection
    #[error("No link endpoint reachable (tried: {0})")]
    TransportNotFound(String),

    /// Calibration liveness gate was never satisfied
    #[error("Calibration timed out after {0:?} waiting for stick deflection")]
    CalibrationTimeout(Duration),

    /// Calibration was cancelled by the operator
    #[error("Calibration cancelled")]
    CalibrationCancelled,
}

/// Result type alias for ROV Pilot
pub type Result<T> = std::result::Result<T, RovPilotError>;
