//! SFTP packet framing.
//!
//! # Packet Format
//!
//! ```text
//! uint32    length
//! byte      type
//! byte[n]   payload (n = length - 1)
//! ```
//!
//! `length` counts the type byte plus the payload. The framer knows nothing
//! about message semantics; [`super::message`] turns packets into typed
//! messages.

use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use usftp_platform::{UsftpError, UsftpResult};

/// Size of the length prefix plus the type byte.
pub const HEADER_LEN: usize = 5;

/// Default cap on inbound packet length (256 KiB of data plus headroom).
pub const DEFAULT_MAX_PACKET_SIZE: u32 = 256 * 1024 + 1024;

/// One framed unit on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    msg_type: u8,
    payload: Bytes,
}

impl Packet {
    /// Creates a packet from a type tag and payload.
    pub fn new(msg_type: u8, payload: impl Into<Bytes>) -> Self {
        Self {
            msg_type,
            payload: payload.into(),
        }
    }

    /// Type tag.
    pub fn msg_type(&self) -> u8 {
        self.msg_type
    }

    /// Payload bytes (everything after the type tag).
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Value of the length field: type byte plus payload.
    pub fn length(&self) -> u32 {
        self.payload.len() as u32 + 1
    }

    /// Serializes to wire format.
    pub fn to_bytes(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(HEADER_LEN + self.payload.len());
        buf.put_u32(self.length());
        buf.put_u8(self.msg_type);
        buf.put_slice(&self.payload);
        buf
    }

    /// Parses one packet from the start of `data`.
    ///
    /// Returns the packet and the number of bytes consumed.
    pub fn from_bytes(data: &[u8]) -> UsftpResult<(Self, usize)> {
        if data.len() < HEADER_LEN {
            return Err(UsftpError::Malformed("packet too short".to_string()));
        }

        let length = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize;
        if length == 0 {
            return Err(UsftpError::Malformed("zero packet length".to_string()));
        }
        if data.len() < 4 + length {
            return Err(UsftpError::Malformed(format!(
                "packet incomplete: declared {} bytes, have {}",
                length,
                data.len() - 4
            )));
        }

        let packet = Self {
            msg_type: data[4],
            payload: Bytes::copy_from_slice(&data[HEADER_LEN..4 + length]),
        };
        Ok((packet, 4 + length))
    }
}

/// Reads exactly one packet from `reader`.
///
/// Any short read or stream failure is reported as [`UsftpError::Io`]. A
/// declared length of zero or above `max_len` is rejected as malformed
/// before the payload is allocated.
pub async fn read_packet<R>(reader: &mut R, max_len: u32) -> UsftpResult<Packet>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let length = reader.read_u32().await?;
    if length == 0 {
        return Err(UsftpError::Malformed("zero packet length".to_string()));
    }
    if length > max_len {
        return Err(UsftpError::Malformed(format!(
            "packet length {} exceeds limit {}",
            length, max_len
        )));
    }

    let msg_type = reader.read_u8().await?;
    let mut payload = vec![0u8; length as usize - 1];
    reader.read_exact(&mut payload).await?;

    Ok(Packet::new(msg_type, payload))
}

/// Frames `payload` under `msg_type` and writes it with a single write call.
///
/// Returns the number of bytes written, header included.
pub async fn write_packet<W>(writer: &mut W, msg_type: u8, payload: &[u8]) -> UsftpResult<usize>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let length = u32::try_from(payload.len() + 1)
        .map_err(|_| UsftpError::InvalidRequest("payload too large to frame".to_string()))?;

    let mut frame = BytesMut::with_capacity(HEADER_LEN + payload.len());
    frame.put_u32(length);
    frame.put_u8(msg_type);
    frame.put_slice(payload);

    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(frame.len())
}
