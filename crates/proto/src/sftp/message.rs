//! SFTP protocol messages.
//!
//! The catalog is closed: [`SftpMessage`] has one variant per supported
//! message and [`SftpMessage::decode`] is the single entry point from a
//! `(type, payload)` pair to a typed value. Consumers match on the enum.
//!
//! Byte layouts (after the packet header):
//!
//! ```text
//! INIT      (1)   uint32 version
//! VERSION   (2)   uint32 version, (string name, string data)*
//! OPEN      (3)   uint32 id, string filename, uint32 pflags, ATTRS
//! CLOSE     (4)   uint32 id, string handle
//! READ      (5)   uint32 id, string handle, uint64 offset, uint32 len
//! OPENDIR   (11)  uint32 id, string path
//! READDIR   (12)  uint32 id, string handle
//! STATUS    (101) uint32 id, uint32 code, string message [, string lang]
//! HANDLE    (102) uint32 id, string handle
//! DATA      (103) uint32 id, string data
//! NAME      (104) uint32 id, uint32 count, count * (string filename,
//!                 string longname, ATTRS)
//! ```

use super::encoding::{
    read_bytes, read_string, read_u32, read_u64, write_bytes, write_string, write_u32, write_u64,
};
use super::packet::Packet;
use super::types::{FileAttributes, FileOpenFlags, Handle, NameEntry, StatusCode};
use bytes::{Bytes, BytesMut};
use usftp_platform::{UsftpError, UsftpResult};

/// SFTP protocol version (v3).
pub const SFTP_VERSION: u32 = 3;

/// Request id reserved for the handshake.
pub const HANDSHAKE_ID: u32 = 0;

/// SFTP message type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SftpMessageType {
    /// SSH_FXP_INIT - Initialize SFTP session
    Init = 1,
    /// SSH_FXP_VERSION - Version response
    Version = 2,
    /// SSH_FXP_OPEN - Open file
    Open = 3,
    /// SSH_FXP_CLOSE - Close file/directory
    Close = 4,
    /// SSH_FXP_READ - Read from file
    Read = 5,
    /// SSH_FXP_OPENDIR - Open directory
    OpenDir = 11,
    /// SSH_FXP_READDIR - Read directory
    ReadDir = 12,
    /// SSH_FXP_STATUS - Status response
    Status = 101,
    /// SSH_FXP_HANDLE - File handle response
    Handle = 102,
    /// SSH_FXP_DATA - Data response
    Data = 103,
    /// SSH_FXP_NAME - Name response
    Name = 104,
}

impl SftpMessageType {
    /// Convert from u8.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Init),
            2 => Some(Self::Version),
            3 => Some(Self::Open),
            4 => Some(Self::Close),
            5 => Some(Self::Read),
            11 => Some(Self::OpenDir),
            12 => Some(Self::ReadDir),
            101 => Some(Self::Status),
            102 => Some(Self::Handle),
            103 => Some(Self::Data),
            104 => Some(Self::Name),
            _ => None,
        }
    }

    /// True for message types whose payload starts with a request id.
    pub fn carries_request_id(self) -> bool {
        !matches!(self, Self::Init | Self::Version)
    }
}

/// A decoded SFTP message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SftpMessage {
    /// Client hello
    Init {
        /// Requested protocol version
        version: u32,
    },
    /// Server hello
    Version {
        /// Negotiated protocol version
        version: u32,
        /// Extension name/data pairs announced by the server
        extensions: Vec<(String, String)>,
    },
    /// Open a directory for listing
    OpenDir {
        /// Request id
        id: u32,
        /// Directory path
        path: String,
    },
    /// Read the next batch of directory entries
    ReadDir {
        /// Request id
        id: u32,
        /// Directory handle
        handle: Handle,
    },
    /// Release a file or directory handle
    Close {
        /// Request id
        id: u32,
        /// Handle to release
        handle: Handle,
    },
    /// Open a file
    Open {
        /// Request id
        id: u32,
        /// File path
        filename: String,
        /// SSH_FXF_* flags; READ is mandatory
        pflags: u32,
    },
    /// Read a byte range from an open file
    Read {
        /// Request id
        id: u32,
        /// File handle
        handle: Handle,
        /// Byte offset
        offset: u64,
        /// Maximum bytes to return
        len: u32,
    },
    /// Handle issued by the server
    Handle {
        /// Request id
        id: u32,
        /// Opaque handle
        handle: Handle,
    },
    /// Status reply
    Status {
        /// Request id
        id: u32,
        /// SSH_FX_* code
        code: u32,
        /// Server supplied message
        message: String,
        /// Language tag, when the server sent one
        language: Option<String>,
    },
    /// Directory entries
    Name {
        /// Request id
        id: u32,
        /// Entries in server order
        entries: Vec<NameEntry>,
    },
    /// File data
    Data {
        /// Request id
        id: u32,
        /// Bytes read
        data: Bytes,
    },
}

impl SftpMessage {
    /// Type tag of this message.
    pub fn msg_type(&self) -> SftpMessageType {
        match self {
            Self::Init { .. } => SftpMessageType::Init,
            Self::Version { .. } => SftpMessageType::Version,
            Self::OpenDir { .. } => SftpMessageType::OpenDir,
            Self::ReadDir { .. } => SftpMessageType::ReadDir,
            Self::Close { .. } => SftpMessageType::Close,
            Self::Open { .. } => SftpMessageType::Open,
            Self::Read { .. } => SftpMessageType::Read,
            Self::Handle { .. } => SftpMessageType::Handle,
            Self::Status { .. } => SftpMessageType::Status,
            Self::Name { .. } => SftpMessageType::Name,
            Self::Data { .. } => SftpMessageType::Data,
        }
    }

    /// Request id, for every message except the handshake pair.
    pub fn request_id(&self) -> Option<u32> {
        match self {
            Self::Init { .. } | Self::Version { .. } => None,
            Self::OpenDir { id, .. }
            | Self::ReadDir { id, .. }
            | Self::Close { id, .. }
            | Self::Open { id, .. }
            | Self::Read { id, .. }
            | Self::Handle { id, .. }
            | Self::Status { id, .. }
            | Self::Name { id, .. }
            | Self::Data { id, .. } => Some(*id),
        }
    }

    /// Builds a status reply with the canonical message for `code`.
    pub fn status(id: u32, code: StatusCode) -> Self {
        Self::Status {
            id,
            code: code as u32,
            message: code.message().to_string(),
            language: None,
        }
    }

    /// Serializes the payload (everything after the type tag).
    pub fn encode_payload(&self) -> UsftpResult<BytesMut> {
        let mut buf = BytesMut::new();

        match self {
            Self::Init { version } => {
                write_u32(&mut buf, *version);
            }
            Self::Version {
                version,
                extensions,
            } => {
                write_u32(&mut buf, *version);
                for (name, data) in extensions {
                    write_string(&mut buf, name);
                    write_string(&mut buf, data);
                }
            }
            Self::OpenDir { id, path } => {
                write_u32(&mut buf, *id);
                write_string(&mut buf, path);
            }
            Self::ReadDir { id, handle }
            | Self::Close { id, handle }
            | Self::Handle { id, handle } => {
                write_u32(&mut buf, *id);
                write_bytes(&mut buf, handle.as_bytes());
            }
            Self::Open {
                id,
                filename,
                pflags,
            } => {
                if pflags & FileOpenFlags::READ == 0 {
                    return Err(UsftpError::InvalidRequest(
                        "SSH_FXF_READ must be set for reading".to_string(),
                    ));
                }
                write_u32(&mut buf, *id);
                write_string(&mut buf, filename);
                write_u32(&mut buf, *pflags);
                // No attributes are sent: empty flag word
                write_u32(&mut buf, 0);
            }
            Self::Read {
                id,
                handle,
                offset,
                len,
            } => {
                write_u32(&mut buf, *id);
                write_bytes(&mut buf, handle.as_bytes());
                write_u64(&mut buf, *offset);
                write_u32(&mut buf, *len);
            }
            Self::Status {
                id,
                code,
                message,
                language,
            } => {
                write_u32(&mut buf, *id);
                write_u32(&mut buf, *code);
                write_string(&mut buf, message);
                if let Some(language) = language {
                    write_string(&mut buf, language);
                }
            }
            Self::Name { id, entries } => {
                write_u32(&mut buf, *id);
                write_u32(&mut buf, entries.len() as u32);
                for entry in entries {
                    write_string(&mut buf, &entry.filename);
                    write_string(&mut buf, &entry.longname);
                    entry.attrs.encode(&mut buf)?;
                }
            }
            Self::Data { id, data } => {
                write_u32(&mut buf, *id);
                write_bytes(&mut buf, data);
            }
        }

        Ok(buf)
    }

    /// Decodes a payload under the given type tag.
    pub fn decode(msg_type: u8, payload: &[u8]) -> UsftpResult<Self> {
        let kind =
            SftpMessageType::from_u8(msg_type).ok_or(UsftpError::UnknownMessageType(msg_type))?;
        let mut buf = payload;

        let message = match kind {
            SftpMessageType::Init => Self::Init {
                version: read_u32(&mut buf)?,
            },
            SftpMessageType::Version => {
                let version = read_u32(&mut buf)?;
                let mut extensions = Vec::new();
                while !buf.is_empty() {
                    let name = read_string(&mut buf)?;
                    let data = read_string(&mut buf)?;
                    extensions.push((name, data));
                }
                Self::Version {
                    version,
                    extensions,
                }
            }
            SftpMessageType::OpenDir => Self::OpenDir {
                id: read_u32(&mut buf)?,
                path: read_string(&mut buf)?,
            },
            SftpMessageType::ReadDir => Self::ReadDir {
                id: read_u32(&mut buf)?,
                handle: Handle(read_bytes(&mut buf)?),
            },
            SftpMessageType::Close => Self::Close {
                id: read_u32(&mut buf)?,
                handle: Handle(read_bytes(&mut buf)?),
            },
            SftpMessageType::Open => {
                let id = read_u32(&mut buf)?;
                let filename = read_string(&mut buf)?;
                let pflags = read_u32(&mut buf)?;
                // Attributes are parsed for validation and otherwise unused
                FileAttributes::decode(&mut buf)?;
                Self::Open {
                    id,
                    filename,
                    pflags,
                }
            }
            SftpMessageType::Read => Self::Read {
                id: read_u32(&mut buf)?,
                handle: Handle(read_bytes(&mut buf)?),
                offset: read_u64(&mut buf)?,
                len: read_u32(&mut buf)?,
            },
            SftpMessageType::Handle => Self::Handle {
                id: read_u32(&mut buf)?,
                handle: Handle(read_bytes(&mut buf)?),
            },
            SftpMessageType::Status => {
                let id = read_u32(&mut buf)?;
                let code = read_u32(&mut buf)?;
                let message = read_string(&mut buf)?;
                let language = if buf.is_empty() {
                    None
                } else {
                    Some(read_string(&mut buf)?)
                };
                Self::Status {
                    id,
                    code,
                    message,
                    language,
                }
            }
            SftpMessageType::Name => {
                let id = read_u32(&mut buf)?;
                let count = read_u32(&mut buf)?;
                // Each entry takes at least 12 bytes
                let mut entries = Vec::with_capacity((count as usize).min(buf.len() / 12));
                for _ in 0..count {
                    let filename = read_string(&mut buf)?;
                    let longname = read_string(&mut buf)?;
                    let attrs = FileAttributes::decode(&mut buf)?;
                    entries.push(NameEntry {
                        filename,
                        longname,
                        attrs,
                    });
                }
                Self::Name { id, entries }
            }
            SftpMessageType::Data => Self::Data {
                id: read_u32(&mut buf)?,
                data: Bytes::from(read_bytes(&mut buf)?),
            },
        };

        Ok(message)
    }

    /// Frames this message as a packet.
    pub fn to_packet(&self) -> UsftpResult<Packet> {
        let payload = self.encode_payload()?;
        Ok(Packet::new(self.msg_type() as u8, payload.freeze()))
    }

    /// Decodes a framed packet.
    pub fn from_packet(packet: &Packet) -> UsftpResult<Self> {
        Self::decode(packet.msg_type(), packet.payload())
    }

    /// Serializes to wire format, header included.
    pub fn to_bytes(&self) -> UsftpResult<Vec<u8>> {
        Ok(self.to_packet()?.to_bytes().to_vec())
    }

    /// Parses one message from wire format, header included.
    pub fn from_bytes(data: &[u8]) -> UsftpResult<Self> {
        let (packet, _) = Packet::from_bytes(data)?;
        Self::from_packet(&packet)
    }
}

/// Extracts the request id from a raw packet without decoding the rest.
///
/// Used to route a decode failure to the caller that is waiting for it.
/// Every v3 message except INIT and VERSION starts with the id, including
/// types this client does not know.
pub fn peek_request_id(packet: &Packet) -> Option<u32> {
    if let Some(kind) = SftpMessageType::from_u8(packet.msg_type()) {
        if !kind.carries_request_id() {
            return None;
        }
    }
    let mut buf = packet.payload();
    read_u32(&mut buf).ok()
}
