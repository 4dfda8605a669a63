//! Error types for the loudness engine

use loudcal_core::CoreError;
use thiserror::Error;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors that can occur in the loudness engine
#[derive(Error, Debug)]
pub enum EngineError {
    /// User-entered SPL reading outside the accepted range
    #[error("Please enter a valid SPL ({min:.0}-{max:.0} dB)")]
    MeasurementOutOfRange { value: f32, min: f32, max: f32 },

    /// Non-finite value passed to a setter
    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: f32 },

    /// Calibration operation called while no session is running
    #[error("No calibration in progress")]
    CalibrationNotActive,

    /// Calibration started twice
    #[error("Calibration already in progress")]
    CalibrationInProgress,

    /// Profile slot outside 1-3
    #[error("Invalid profile slot: {0} (must be 1-3)")]
    InvalidSlot(u8),

    /// Profile slot with nothing saved in it
    #[error("Profile slot {0} is empty")]
    EmptySlot(u8),

    /// Test tone playback failure
    #[error("Test tone error: {0}")]
    Tone(String),

    /// Background work requested outside a tokio runtime
    #[error("No async runtime available: {0}")]
    Runtime(String),

    /// Storage, filesystem or device error
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Serialization error
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}
