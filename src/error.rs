//! Error types for document store operations.

use mongodb::error::{Error as DriverError, ErrorKind};
use thiserror::Error;

/// Result type alias for document store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Error types for document store operations
///
/// Driver failures are classified into a few coarse kinds so callers can tell
/// "nothing matched" from "the network is gone" from "the server said no"
/// without parsing messages. The underlying driver error is always kept.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Invalid configuration or configuration source failure
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Connection string could not be parsed or the client could not be built
    #[error("Connection failed: {0}")]
    Connection(#[source] DriverError),

    /// The operation matched no document
    #[error("No matching document for {operation}")]
    NoMatch { operation: &'static str },

    /// I/O, DNS or server selection failure
    #[error("Network error: {0}")]
    Network(#[source] DriverError),

    /// The server rejected the command or write
    #[error("Server rejected request: {0}")]
    ServerRejected(#[source] DriverError),

    /// The driver refused the arguments before sending anything
    #[error("Invalid argument: {0}")]
    InvalidArgument(#[source] DriverError),

    /// Any other driver error, unchanged
    #[error("Driver error: {0}")]
    Driver(#[source] DriverError),

    /// The request context was cancelled
    #[error("Operation {operation} cancelled")]
    Cancelled { operation: &'static str },

    /// The request context deadline elapsed
    #[error("Operation {operation} exceeded its deadline")]
    DeadlineExceeded { operation: &'static str },

    /// JSON to BSON conversion error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    /// Classify a driver error
    pub fn from_driver(err: DriverError) -> Self {
        match err.kind.as_ref() {
            ErrorKind::Io(_)
            | ErrorKind::DnsResolve { .. }
            | ErrorKind::ServerSelection { .. }
            | ErrorKind::ConnectionPoolCleared { .. } => StoreError::Network(err),
            ErrorKind::Command(_)
            | ErrorKind::Write(_)
            | ErrorKind::InsertMany(_)
            | ErrorKind::Authentication { .. } => StoreError::ServerRejected(err),
            ErrorKind::InvalidArgument { .. } => StoreError::InvalidArgument(err),
            _ => StoreError::Driver(err),
        }
    }

    /// Underlying driver error, if this error came from the driver
    pub fn driver_error(&self) -> Option<&DriverError> {
        match self {
            StoreError::Connection(e)
            | StoreError::Network(e)
            | StoreError::ServerRejected(e)
            | StoreError::InvalidArgument(e)
            | StoreError::Driver(e) => Some(e),
            _ => None,
        }
    }

    pub fn is_no_match(&self) -> bool {
        matches!(self, StoreError::NoMatch { .. })
    }

    pub fn is_network(&self) -> bool {
        matches!(self, StoreError::Network(_))
    }

    /// Cancelled or out of time
    pub fn is_interrupted(&self) -> bool {
        matches!(
            self,
            StoreError::Cancelled { .. } | StoreError::DeadlineExceeded { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_is_network() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = StoreError::from_driver(DriverError::from(io));

        assert!(err.is_network());
        assert!(err.driver_error().is_some());
        assert!(err.to_string().starts_with("Network error"));
    }

    #[test]
    fn test_no_match_has_no_driver_error() {
        let err = StoreError::NoMatch {
            operation: "find_one",
        };

        assert!(err.is_no_match());
        assert!(err.driver_error().is_none());
        assert!(err.to_string().contains("find_one"));
    }

    #[test]
    fn test_interrupted_kinds() {
        assert!(StoreError::Cancelled { operation: "find" }.is_interrupted());
        assert!(StoreError::DeadlineExceeded { operation: "find" }.is_interrupted());
        assert!(!StoreError::Configuration("bad".to_string()).is_interrupted());
    }
}
