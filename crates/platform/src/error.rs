//! Error types for usftp

use std::fmt;

/// Unified error type for all usftp operations
#[derive(Debug)]
pub enum UsftpError {
    /// Underlying stream read/write failure. Fatal to the session.
    Io(std::io::Error),

    /// Message bytes did not match the declared layout (short buffer,
    /// bad UTF-8, oversized length prefix)
    Malformed(String),

    /// Packet type tag outside the message catalog
    UnknownMessageType(u8),

    /// Attribute block carried extended pairs, which are not supported
    UnsupportedExtension(u32),

    /// Handshake answered with a version other than the one requested
    VersionMismatch {
        /// Version sent in INIT
        expected: u32,
        /// Version returned by the server
        actual: u32,
    },

    /// A response type that is not valid for the current protocol step
    UnexpectedMessage(String),

    /// Server answered with a non-OK status
    RemoteStatus {
        /// Numeric SSH_FX_* status code
        code: u32,
        /// Server supplied message
        message: String,
    },

    /// Request abandoned because the session was cancelled
    Cancelled,

    /// Session has been torn down or its reader has stopped
    SessionClosed,

    /// Request was not answered within the configured timeout
    Timeout,

    /// Caller supplied a request that cannot be encoded
    InvalidRequest(String),

    /// Configuration error
    Config(String),
}

impl UsftpError {
    /// Returns true if the error leaves the session unusable.
    pub fn is_fatal(&self) -> bool {
        matches!(self, UsftpError::Io(_) | UsftpError::SessionClosed)
    }

    /// Returns true if this is a remote status error with the given code.
    pub fn is_remote_status(&self, expected: u32) -> bool {
        matches!(self, UsftpError::RemoteStatus { code, .. } if *code == expected)
    }
}

impl fmt::Display for UsftpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UsftpError::Io(e) => write!(f, "Transport error: {}", e),
            UsftpError::Malformed(msg) => write!(f, "Malformed message: {}", msg),
            UsftpError::UnknownMessageType(t) => write!(f, "Unknown message type: {}", t),
            UsftpError::UnsupportedExtension(count) => {
                write!(f, "Unsupported extended attributes (count {})", count)
            }
            UsftpError::VersionMismatch { expected, actual } => write!(
                f,
                "Protocol version mismatch: expected {}, got {}",
                expected, actual
            ),
            UsftpError::UnexpectedMessage(msg) => write!(f, "Unexpected message: {}", msg),
            UsftpError::RemoteStatus { code, message } => {
                write!(f, "Remote status {}: {}", code, message)
            }
            UsftpError::Cancelled => write!(f, "Request cancelled"),
            UsftpError::SessionClosed => write!(f, "Session closed"),
            UsftpError::Timeout => write!(f, "Request timed out"),
            UsftpError::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            UsftpError::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for UsftpError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            UsftpError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for UsftpError {
    fn from(err: std::io::Error) -> Self {
        UsftpError::Io(err)
    }
}

/// Result type for usftp operations
pub type UsftpResult<T> = Result<T, UsftpError>;
