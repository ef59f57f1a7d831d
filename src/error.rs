//! Error types for Autopilot
//!
//! Centralized error handling using thiserror. Per-item network failures use
//! [`crate::network::ClientError`] and never surface here unless a whole cycle
//! cannot be entered.

use thiserror::Error;

use crate::network::ClientError;

/// All error types that can occur in Autopilot
#[derive(Debug, Error)]
pub enum AutopilotError {
    /// Store collaborator failed (unreachable, corrupt record, ...)
    #[error("Store error: {0}")]
    Store(String),

    /// Network client failure that escaped per-item handling
    #[error("Client error: {0}")]
    Client(#[from] ClientError),

    /// Invalid configuration value
    #[error("Config error: {0}")]
    Config(String),

    /// Invalid state transition or operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result type alias for Autopilot operations
pub type Result<T> = std::result::Result<T, AutopilotError>;
