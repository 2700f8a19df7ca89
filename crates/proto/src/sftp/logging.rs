//! Structured logging for SFTP sessions
//!
//! Provides structured, contextual logging using the `tracing` framework.
//! All log messages include relevant context fields for debugging.
//!
//! # Log Levels
//!
//! - **TRACE**: Individual packets routed by the reader
//! - **DEBUG**: Requests sent, handles opened and closed
//! - **INFO**: Session lifecycle (handshake, close)
//! - **WARN**: Orphaned responses, cleanup failures, reader errors
//!
//! # Example
//!
//! ```no_run
//! tracing_subscriber::fmt()
//!     .with_env_filter("usftp_proto::sftp=debug")
//!     .init();
//! ```

use super::message::SftpMessageType;
use tracing::{debug, info, trace, warn};
use usftp_platform::UsftpError;

/// Log an outbound request
pub fn log_request_sent(request_id: u32, msg_type: SftpMessageType, bytes: usize) {
    debug!(
        request_id = request_id,
        msg_type = ?msg_type,
        bytes = bytes,
        "SFTP request sent"
    );
}

/// Log a response handed to its waiter
pub fn log_response_routed(request_id: u32, msg_type: SftpMessageType) {
    trace!(
        request_id = request_id,
        msg_type = ?msg_type,
        "SFTP response routed"
    );
}

/// Log a response nobody is waiting for (late after timeout, or bogus id)
pub fn log_orphan_response(request_id: u32, msg_type: Option<SftpMessageType>) {
    warn!(
        request_id = request_id,
        msg_type = ?msg_type,
        "Dropping SFTP response with no pending request"
    );
}

/// Log a failed best-effort handle close
pub fn log_close_failure(path: &str, error: &UsftpError) {
    warn!(
        path = path,
        error = %error,
        "Failed to close SFTP handle"
    );
}

/// Log reader termination
pub fn log_reader_stopped(reason: &str, pending: usize) {
    if pending > 0 {
        warn!(
            reason = reason,
            pending = pending,
            "SFTP reader stopped with requests in flight"
        );
    } else {
        debug!(reason = reason, "SFTP reader stopped");
    }
}

/// Log completed handshake
pub fn log_handshake(version: u32, extensions: usize) {
    info!(
        version = version,
        extensions = extensions,
        "SFTP session initialized"
    );
}
