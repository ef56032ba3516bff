//! # Backend Errors
//!
//! Error types for key-value backend operations.
//!
//! These never cross the order store boundary; the store maps them onto
//! [`RepositoryError`](crate::infrastructure::persistence::RepositoryError).
//!
//! # Examples
//!
//! ```
//! use order_store::infrastructure::kv::BackendError;
//!
//! let error = BackendError::connection("connection refused");
//! assert!(error.is_retryable());
//!
//! let error = BackendError::invalid_command("empty key");
//! assert!(!error.is_retryable());
//! ```

use thiserror::Error;

/// Error type for key-value backend operations.
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    /// Transport failure: connect, I/O, dropped connection.
    #[error("backend connection error: {message}")]
    Connection {
        /// Error message.
        message: String,
    },

    /// The backend answered with an error or an unexpected reply shape.
    #[error("backend response error: {message}")]
    Response {
        /// Error message.
        message: String,
    },

    /// A command was rejected while building a batch.
    #[error("invalid command: {message}")]
    InvalidCommand {
        /// Error message.
        message: String,
    },

    /// The backend is unavailable.
    #[error("backend unavailable: {message}")]
    Unavailable {
        /// Error message.
        message: String,
    },
}

impl BackendError {
    /// Creates a connection error.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a response error.
    #[must_use]
    pub fn response(message: impl Into<String>) -> Self {
        Self::Response {
            message: message.into(),
        }
    }

    /// Creates an invalid command error.
    #[must_use]
    pub fn invalid_command(message: impl Into<String>) -> Self {
        Self::InvalidCommand {
            message: message.into(),
        }
    }

    /// Creates an unavailable error.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Returns true if retrying the call may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Unavailable { .. })
    }
}

impl From<redis::RedisError> for BackendError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_io_error() || err.is_connection_dropped() || err.is_timeout() {
            Self::connection(err.to_string())
        } else {
            Self::response(err.to_string())
        }
    }
}

/// Result type for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(BackendError::connection("x").is_retryable());
        assert!(BackendError::unavailable("x").is_retryable());
        assert!(!BackendError::response("x").is_retryable());
        assert!(!BackendError::invalid_command("x").is_retryable());
    }

    #[test]
    fn display_includes_message() {
        let err = BackendError::response("WRONGTYPE");
        assert_eq!(err.to_string(), "backend response error: WRONGTYPE");
    }
}
