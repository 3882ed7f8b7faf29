//! Error types for the playback pipeline
//!
//! Defines module-specific error types using thiserror for clear error
//! propagation. Invalid user input (an unsupported track reference) is a
//! distinct variant so callers can tell a no-op apart from a real failure.

use thiserror::Error;

/// Main error type for the playback pipeline
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Track reference not served by the supported provider
    #[error("Unsupported track reference: {0}")]
    UnsupportedReference(String),

    /// Provider listed no encoding matching the target profile
    #[error("No playable format for: {0}")]
    NoPlayableFormat(String),

    /// Media provider metadata or stream errors
    #[error("Provider error: {0}")]
    Provider(String),

    /// HTTP transport errors while talking to the provider
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Transcoder subprocess spawn or pipe errors
    #[error("Transcoder error: {0}")]
    Transcoder(String),

    /// Voice connection errors
    #[error("Connection error: {0}")]
    Connection(String),

    /// Voice connection did not become ready within the configured timeout
    #[error("Timed out waiting for voice connection to become ready")]
    JoinTimeout,

    /// Operation on a session that has already been destroyed
    #[error("Session has been destroyed")]
    SessionDestroyed,

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error signals invalid input rather than an operational
    /// failure. Invalid input leaves prior state untouched and is safe to
    /// surface as "nothing happened".
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Error::UnsupportedReference(_))
    }
}

/// Convenience Result type using the pipeline Error
pub type Result<T> = std::result::Result<T, Error>;
