//! Error types for kasa-bridge.

use thiserror::Error;

/// Main error type for all kasa-bridge operations.
#[derive(Debug, Error)]
pub enum KasaError {
    /// I/O error during socket operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Protocol error (malformed template, invalid reply document, etc.).
    #[error("Protocol error: {0}")]
    Protocol(String),
}

/// Result type alias using KasaError.
pub type Result<T> = std::result::Result<T, KasaError>;
