//! SFTP data types and structures.

use super::encoding::{read_u32, read_u64, write_u32, write_u64};
use super::filemode::FileMode;
use bytes::BufMut;
use std::fmt;
use usftp_platform::{UsftpError, UsftpResult};

/// SFTP status codes (SSH_FX_*).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum StatusCode {
    /// SSH_FX_OK - Success
    Ok = 0,
    /// SSH_FX_EOF - End of file
    Eof = 1,
    /// SSH_FX_NO_SUCH_FILE - No such file
    NoSuchFile = 2,
    /// SSH_FX_PERMISSION_DENIED - Permission denied
    PermissionDenied = 3,
    /// SSH_FX_FAILURE - General failure
    Failure = 4,
    /// SSH_FX_BAD_MESSAGE - Bad message
    BadMessage = 5,
    /// SSH_FX_NO_CONNECTION - No connection
    NoConnection = 6,
    /// SSH_FX_CONNECTION_LOST - Connection lost
    ConnectionLost = 7,
    /// SSH_FX_OP_UNSUPPORTED - Operation not supported
    OpUnsupported = 8,
}

impl StatusCode {
    /// Convert from u32.
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Ok),
            1 => Some(Self::Eof),
            2 => Some(Self::NoSuchFile),
            3 => Some(Self::PermissionDenied),
            4 => Some(Self::Failure),
            5 => Some(Self::BadMessage),
            6 => Some(Self::NoConnection),
            7 => Some(Self::ConnectionLost),
            8 => Some(Self::OpUnsupported),
            _ => None,
        }
    }

    /// Returns the canonical message for this code.
    pub fn message(&self) -> &'static str {
        match self {
            Self::Ok => "Success",
            Self::Eof => "End of file",
            Self::NoSuchFile => "No such file or directory",
            Self::PermissionDenied => "Permission denied",
            Self::Failure => "Failure",
            Self::BadMessage => "Bad message",
            Self::NoConnection => "No connection",
            Self::ConnectionLost => "Connection lost",
            Self::OpUnsupported => "Operation not supported",
        }
    }
}

/// File open flags (SSH_FXF_*).
#[derive(Debug, Clone, Copy)]
pub struct FileOpenFlags(pub u32);

impl FileOpenFlags {
    /// SSH_FXF_READ - Open for reading
    pub const READ: u32 = 0x00000001;
    /// SSH_FXF_WRITE - Open for writing
    pub const WRITE: u32 = 0x00000002;
    /// SSH_FXF_APPEND - Force writes to append
    pub const APPEND: u32 = 0x00000004;
    /// SSH_FXF_CREAT - Create if doesn't exist
    pub const CREAT: u32 = 0x00000008;
    /// SSH_FXF_TRUNC - Truncate to 0 length
    pub const TRUNC: u32 = 0x00000010;
    /// SSH_FXF_EXCL - Fail if file exists
    pub const EXCL: u32 = 0x00000020;
}

/// File attribute flags.
#[derive(Debug, Clone, Copy)]
pub struct AttrFlags(pub u32);

impl AttrFlags {
    /// SSH_FILEXFER_ATTR_SIZE
    pub const SIZE: u32 = 0x00000001;
    /// SSH_FILEXFER_ATTR_UIDGID
    pub const UIDGID: u32 = 0x00000002;
    /// SSH_FILEXFER_ATTR_PERMISSIONS
    pub const PERMISSIONS: u32 = 0x00000004;
    /// SSH_FILEXFER_ATTR_ACMODTIME
    pub const ACMODTIME: u32 = 0x00000008;
    /// SSH_FILEXFER_ATTR_EXTENDED
    pub const EXTENDED: u32 = 0x80000000;
}

/// File attributes. Each field is present only when its flag bit was set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FileAttributes {
    /// File size in bytes
    pub size: Option<u64>,
    /// User ID
    pub uid: Option<u32>,
    /// Group ID
    pub gid: Option<u32>,
    /// Permissions
    pub permissions: Option<FileMode>,
    /// Access time (Unix timestamp)
    pub atime: Option<u32>,
    /// Modification time (Unix timestamp)
    pub mtime: Option<u32>,
    /// Number of extended pairs; only zero is supported
    pub extended_count: Option<u32>,
}

impl FileAttributes {
    /// Creates empty attributes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Flag word describing which fields are present.
    pub fn flags(&self) -> u32 {
        let mut flags = 0u32;
        if self.size.is_some() {
            flags |= AttrFlags::SIZE;
        }
        if self.uid.is_some() && self.gid.is_some() {
            flags |= AttrFlags::UIDGID;
        }
        if self.permissions.is_some() {
            flags |= AttrFlags::PERMISSIONS;
        }
        if self.atime.is_some() && self.mtime.is_some() {
            flags |= AttrFlags::ACMODTIME;
        }
        if self.extended_count.is_some() {
            flags |= AttrFlags::EXTENDED;
        }
        flags
    }

    /// Writes the flag word followed by the present fields.
    ///
    /// `uid`/`gid` and `atime`/`mtime` travel as pairs on the wire; setting
    /// only one half of a pair is rejected.
    pub fn encode<B: BufMut>(&self, buf: &mut B) -> UsftpResult<()> {
        if self.uid.is_some() != self.gid.is_some() {
            return Err(UsftpError::InvalidRequest(
                "uid and gid must be set together".to_string(),
            ));
        }
        if self.atime.is_some() != self.mtime.is_some() {
            return Err(UsftpError::InvalidRequest(
                "atime and mtime must be set together".to_string(),
            ));
        }
        if let Some(count) = self.extended_count {
            if count > 0 {
                return Err(UsftpError::UnsupportedExtension(count));
            }
        }

        write_u32(buf, self.flags());

        if let Some(size) = self.size {
            write_u64(buf, size);
        }
        if let (Some(uid), Some(gid)) = (self.uid, self.gid) {
            write_u32(buf, uid);
            write_u32(buf, gid);
        }
        if let Some(permissions) = self.permissions {
            write_u32(buf, permissions.0);
        }
        if let (Some(atime), Some(mtime)) = (self.atime, self.mtime) {
            write_u32(buf, atime);
            write_u32(buf, mtime);
        }
        if let Some(count) = self.extended_count {
            write_u32(buf, count);
        }
        Ok(())
    }

    /// Reads a flag word and exactly the fields it announces, in the order
    /// SIZE, UIDGID, PERMISSIONS, ACMODTIME, EXTENDED.
    pub fn decode(buf: &mut &[u8]) -> UsftpResult<Self> {
        let flags = read_u32(buf)?;
        let mut attrs = Self::new();

        if flags & AttrFlags::SIZE != 0 {
            attrs.size = Some(read_u64(buf)?);
        }
        if flags & AttrFlags::UIDGID != 0 {
            attrs.uid = Some(read_u32(buf)?);
            attrs.gid = Some(read_u32(buf)?);
        }
        if flags & AttrFlags::PERMISSIONS != 0 {
            attrs.permissions = Some(FileMode(read_u32(buf)?));
        }
        if flags & AttrFlags::ACMODTIME != 0 {
            attrs.atime = Some(read_u32(buf)?);
            attrs.mtime = Some(read_u32(buf)?);
        }
        if flags & AttrFlags::EXTENDED != 0 {
            let count = read_u32(buf)?;
            if count > 0 {
                return Err(UsftpError::UnsupportedExtension(count));
            }
            attrs.extended_count = Some(count);
        }

        Ok(attrs)
    }

    /// True if permissions are present and classify as a directory.
    pub fn is_dir(&self) -> bool {
        self.permissions.map(FileMode::is_dir).unwrap_or(false)
    }

    /// True if permissions are present and classify as a regular file.
    pub fn is_regular(&self) -> bool {
        self.permissions.map(FileMode::is_regular).unwrap_or(false)
    }
}

/// Opaque server-issued handle for an open file or directory.
#[derive(Clone, PartialEq, Eq)]
pub struct Handle(pub Vec<u8>);

impl Handle {
    /// Raw handle bytes, echoed back verbatim to the server.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle(")?;
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        write!(f, ")")
    }
}

impl From<&[u8]> for Handle {
    fn from(bytes: &[u8]) -> Self {
        Handle(bytes.to_vec())
    }
}

/// One entry of an SSH_FXP_NAME response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NameEntry {
    /// Entry name relative to the listed directory
    pub filename: String,
    /// `ls -l` style rendering supplied by the server
    pub longname: String,
    /// Entry attributes
    pub attrs: FileAttributes,
}

impl NameEntry {
    /// Creates an entry.
    pub fn new(filename: impl Into<String>, longname: impl Into<String>, attrs: FileAttributes) -> Self {
        Self {
            filename: filename.into(),
            longname: longname.into(),
            attrs,
        }
    }

    /// True for the `.` and `..` pseudo entries.
    pub fn is_dot(&self) -> bool {
        self.filename == "." || self.filename == ".."
    }
}

/// A directory entry placed in a tree. A parent owns its children.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FileNode {
    /// Directory the entry was listed from
    pub dir: String,
    /// The entry itself
    pub entry: NameEntry,
    /// Children, populated only for directories other than `.` and `..`
    pub children: Vec<FileNode>,
}

impl FileNode {
    /// Creates a leaf node for `entry` listed under `dir`.
    pub fn new(dir: impl Into<String>, entry: NameEntry) -> Self {
        Self {
            dir: dir.into(),
            entry,
            children: Vec::new(),
        }
    }

    /// Entry name.
    pub fn filename(&self) -> &str {
        &self.entry.filename
    }

    /// Entry attributes.
    pub fn attrs(&self) -> &FileAttributes {
        &self.entry.attrs
    }

    /// Directory plus filename.
    pub fn full_path(&self) -> String {
        join_path(&self.dir, &self.entry.filename)
    }

    /// True if the entry classifies as a directory.
    pub fn is_dir(&self) -> bool {
        self.entry.attrs.is_dir()
    }

    /// True for `.` and `..`.
    pub fn is_dot(&self) -> bool {
        self.entry.is_dot()
    }

    /// Number of nodes in this subtree, this node included.
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(FileNode::count).sum::<usize>()
    }
}

/// Joins a directory and an entry name with exactly one separator.
pub fn join_path(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else if dir.ends_with('/') {
        format!("{}{}", dir, name)
    } else {
        format!("{}/{}", dir, name)
    }
}
