//! Error types for skypipe.

use thiserror::Error;

/// Main error type for all skypipe operations.
#[derive(Debug, Error)]
pub enum SkypipeError {
    /// I/O error on a socket or local stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error while reading or writing the config file.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Stream-level framing violation. The connection cannot be resynchronised.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Endpoint string could not be parsed.
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Connection closed unexpectedly.
    #[error("Connection closed")]
    ConnectionClosed,

    /// No usable broker endpoint could be found.
    #[error("Discovery failed: {0}")]
    Discovery(String),
}

/// Result type alias using SkypipeError.
pub type Result<T> = std::result::Result<T, SkypipeError>;
