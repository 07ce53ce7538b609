//! Error types for the platform seams.
//!
//! The controller core never returns these past its own boundary; they are
//! folded into [`OperationOutcome`](crate::domain::models::OperationOutcome)
//! values. Application code propagates them with `anyhow`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BleError {
    #[error("Device enumeration failed: {0}")]
    Enumeration(String),

    #[error("Failed to open device {id}: {reason}")]
    Open { id: String, reason: String },

    #[error("Bluetooth is not supported on this platform")]
    Unsupported,
}

#[derive(Debug, Error)]
pub enum HostError {
    /// The host runtime is not running
    #[error("no server for background application")]
    NoServer,

    #[error("host runtime init failed: {0}")]
    Init(String),
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Settings I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed settings: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid UUID '{value}': {source}")]
    Uuid {
        value: String,
        #[source]
        source: uuid::Error,
    },

    #[error("Invalid device name pattern: {0}")]
    Pattern(#[from] regex::Error),
}
