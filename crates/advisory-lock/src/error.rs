//! Error types for advisory-lock

use thiserror::Error;

/// Core error type for advisory lock operations
///
/// Errors are `Clone` so that a single handshake failure can be handed to
/// every operation that was waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The connection handshake failed. Permanent for the owning guard.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// A single lock round trip failed
    #[error("Database operation {function} failed: {message}")]
    DatabaseError {
        /// SQL function that was being called
        function: &'static str,
        /// Message reported by the database or driver
        message: String,
    },

    /// The connection was closed before the operation could run
    #[error("Connection closed")]
    ConnectionClosed,

    /// Invalid configuration (bad connection target, no runtime, ...)
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Create a database error for the given SQL function.
    pub fn database(function: &'static str, message: impl Into<String>) -> Self {
        Self::DatabaseError {
            function,
            message: message.into(),
        }
    }
}

/// Result type alias for advisory lock operations
pub type Result<T> = std::result::Result<T, Error>;
