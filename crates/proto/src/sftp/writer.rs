//! Outbound half of the SFTP stream.

use super::logging::log_request_sent;
use super::message::{SftpMessage, HANDSHAKE_ID};
use super::packet::write_packet;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use usftp_platform::UsftpResult;

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Serializes messages onto the stream, one whole frame at a time.
///
/// Encoding happens before the lock is taken; the lock only covers the
/// write so concurrent callers never interleave bytes mid-frame.
pub struct PacketWriter {
    inner: Mutex<BoxedWriter>,
}

impl PacketWriter {
    /// Wraps the write half of a stream.
    pub fn new<W>(writer: W) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self::from_boxed(Box::new(writer))
    }

    pub(crate) fn from_boxed(writer: BoxedWriter) -> Self {
        Self {
            inner: Mutex::new(writer),
        }
    }

    /// Marshals, frames and writes one message.
    pub async fn write(&self, message: &SftpMessage) -> UsftpResult<()> {
        let msg_type = message.msg_type();
        let payload = message.encode_payload()?;

        let written = {
            let mut writer = self.inner.lock().await;
            write_packet(&mut *writer, msg_type as u8, &payload).await?
        };

        log_request_sent(
            message.request_id().unwrap_or(HANDSHAKE_ID),
            msg_type,
            written,
        );
        Ok(())
    }

    /// Closes the write half, signalling end of input to the server.
    pub async fn shutdown(&self) -> UsftpResult<()> {
        let mut writer = self.inner.lock().await;
        writer.shutdown().await?;
        Ok(())
    }
}
