//! # Link Error Types
//!
//! Error types for controller link operations.
//!
//! ## Error Categories
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Link Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │   Controller    │  │   Connection    │  │     Lifecycle           │ │
//! │  │   (no retry)    │  │ (reconnect)     │  │                         │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  Nak            │  │ ConnectionFailed│  │  Cancelled              │ │
//! │  │  ChecksumMism.  │  │ Disconnected    │  │                         │ │
//! │  │  DuplicatePacket│  │ Timeout         │  │                         │ │
//! │  │  Controller     │  │ Io              │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  Connection errors drop the transport; the next command reconnects.    │
//! │  No error is retried by the command service itself.                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Result type alias for link operations.
pub type LinkResult<T> = Result<T, LinkError>;

/// Link error type covering all controller link failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    // =========================================================================
    // Controller Replies
    // =========================================================================
    /// The controller refused the command.
    #[error("Controller rejected command: {0}")]
    Nak(String),

    /// The controller reported a checksum error, or a reply frame was
    /// malformed.
    #[error("Checksum mismatch: {0}")]
    ChecksumMismatch(String),

    /// The controller reported a duplicated packet.
    #[error("Controller reported duplicate packet")]
    DuplicatePacket,

    /// Any other controller-side fault.
    #[error("Controller error: {0}")]
    Controller(String),

    // =========================================================================
    // Connection Errors
    // =========================================================================
    /// Failed to establish the connection.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The connection dropped.
    #[error("Disconnected from controller")]
    Disconnected,

    /// No reply within the allowed time.
    #[error("Timed out after {0} ms")]
    Timeout(u64),

    /// Socket read or write failed.
    #[error("I/O error: {0}")]
    Io(String),

    // =========================================================================
    // Lifecycle
    // =========================================================================
    /// The shutdown signal interrupted the operation.
    #[error("Cancelled by shutdown")]
    Cancelled,
}

impl LinkError {
    /// Returns true if the link must be re-established after this error.
    ///
    /// ## Connection errors
    /// - Connection failures, drops and socket errors
    /// - Reply timeouts (the controller stopped answering)
    ///
    /// ## Not connection errors
    /// - Controller replies (Nak, checksum, duplicate, other)
    /// - Cancellation
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            LinkError::ConnectionFailed(_)
                | LinkError::Disconnected
                | LinkError::Timeout(_)
                | LinkError::Io(_)
        )
    }

    /// Returns true if the controller itself reported a fault.
    pub fn is_controller_fault(&self) -> bool {
        matches!(
            self,
            LinkError::Nak(_)
                | LinkError::ChecksumMismatch(_)
                | LinkError::DuplicatePacket
                | LinkError::Controller(_)
        )
    }
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<std::io::Error> for LinkError {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind;
        match err.kind() {
            ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe
            | ErrorKind::UnexpectedEof => LinkError::Disconnected,
            ErrorKind::ConnectionRefused | ErrorKind::NotConnected => {
                LinkError::ConnectionFailed(err.to_string())
            }
            _ => LinkError::Io(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_error_categorization() {
        assert!(LinkError::ConnectionFailed("refused".into()).is_connection_error());
        assert!(LinkError::Disconnected.is_connection_error());
        assert!(LinkError::Timeout(3000).is_connection_error());

        assert!(!LinkError::Nak("NG".into()).is_connection_error());
        assert!(!LinkError::DuplicatePacket.is_connection_error());
        assert!(!LinkError::Cancelled.is_connection_error());
    }

    #[test]
    fn test_controller_fault_categorization() {
        assert!(LinkError::ChecksumMismatch("bad length".into()).is_controller_fault());
        assert!(LinkError::Controller("??".into()).is_controller_fault());
        assert!(!LinkError::Disconnected.is_controller_fault());
    }

    #[test]
    fn test_io_error_conversion() {
        let reset = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        assert_eq!(LinkError::from(reset), LinkError::Disconnected);

        let refused = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        assert!(matches!(LinkError::from(refused), LinkError::ConnectionFailed(_)));
    }
}
