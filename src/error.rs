//! Error types for the AMI client

use thiserror::Error;

/// Result alias used throughout the crate.
pub type AmiResult<T> = Result<T, AmiError>;

/// Errors produced by the AMI client.
///
/// Most of these never reach the application directly: the client facade
/// reports failures as `bool` returns or disconnect notifications and logs
/// the underlying error.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AmiError {
    /// TCP I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Host name resolved to no addresses.
    #[error("no address found for host '{host}'")]
    Resolve {
        /// The host that failed to resolve.
        host: String,
    },

    /// An operation did not complete in time.
    #[error("operation timed out after {timeout_ms}ms")]
    Timeout {
        /// The timeout that elapsed.
        timeout_ms: u64,
    },

    /// The peer closed the connection.
    #[error("connection closed")]
    ConnectionClosed,

    /// The transport is not open.
    #[error("not connected")]
    NotConnected,

    /// Malformed outbound data or unusable inbound data.
    #[error("protocol error: {message}")]
    ProtocolError {
        /// Description of the violation.
        message: String,
    },

    /// An inbound packet exceeded the configured size limit.
    #[error("packet too large: {size} bytes (max {max})")]
    PacketTooLarge {
        /// Bytes buffered without finding a terminator.
        size: usize,
        /// Configured limit.
        max: usize,
    },
}

impl AmiError {
    /// Build a [`AmiError::ProtocolError`].
    pub fn protocol_error(message: impl Into<String>) -> Self {
        AmiError::ProtocolError {
            message: message.into(),
        }
    }

    /// `true` for errors that mean the transport is gone.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            AmiError::Io(_) | AmiError::ConnectionClosed | AmiError::NotConnected
        )
    }
}
