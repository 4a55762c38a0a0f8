//! Error types for Tapedeck

use std::io;
use thiserror::Error;

/// Result type for Tapedeck operations
pub type Result<T> = std::result::Result<T, TapeError>;

/// Errors that can occur in Tapedeck
#[derive(Debug, Error)]
pub enum TapeError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Cassette file could not be parsed or encoded
    #[error("Invalid cassette format: {0}")]
    InvalidFormat(String),

    /// Cassette file not found
    #[error("Cassette file not found: {0}")]
    FileNotFound(String),

    /// No recorded interaction matches the live request
    #[error("No matching interaction for {method} {url}")]
    InteractionNotFound {
        /// Method of the unmatched request
        method: String,
        /// URL of the unmatched request
        url: String,
    },

    /// A live call was required but no real transport is bound
    #[error("Transport not configured")]
    TransportUnconfigured,

    /// The real transport failed to complete the call
    #[error("Upstream call failed: {0}")]
    Upstream(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Invalid cassette name
    #[error("Invalid cassette name: {0}")]
    InvalidName(String),
}

impl From<serde_json::Error> for TapeError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_io() {
            Self::Io(err.into())
        } else {
            Self::InvalidFormat(err.to_string())
        }
    }
}

impl TapeError {
    /// Check whether this is a missing-interaction error
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::InteractionNotFound { .. })
    }
}
