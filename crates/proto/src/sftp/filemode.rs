//! POSIX-style file mode carried in the SFTP `permissions` attribute.

use std::fmt;

/// Coarse file type derived from the mode's type field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    /// Directory
    Directory,
    /// Regular file
    Regular,
    /// Anything else (symlink, socket, device, unknown)
    Other,
}

/// File mode: a 4-bit type field plus 9 permission bits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FileMode(pub u32);

impl FileMode {
    /// Mask selecting the type field
    pub const TYPE_MASK: u32 = 0o170000;
    /// Directory type
    pub const DIRECTORY: u32 = 0o040000;
    /// Regular file type
    pub const REGULAR: u32 = 0o100000;
    /// Mask selecting the nine rwx bits
    pub const PERMISSION_MASK: u32 = 0o777;

    /// Owner read
    pub const USER_READ: u32 = 0o400;
    /// Owner write
    pub const USER_WRITE: u32 = 0o200;
    /// Owner execute
    pub const USER_EXEC: u32 = 0o100;
    /// Group read
    pub const GROUP_READ: u32 = 0o040;
    /// Group write
    pub const GROUP_WRITE: u32 = 0o020;
    /// Group execute
    pub const GROUP_EXEC: u32 = 0o010;
    /// Others read
    pub const OTHER_READ: u32 = 0o004;
    /// Others write
    pub const OTHER_WRITE: u32 = 0o002;
    /// Others execute
    pub const OTHER_EXEC: u32 = 0o001;

    /// Raw mode bits.
    pub fn bits(self) -> u32 {
        self.0
    }

    /// The nine permission bits.
    pub fn permissions(self) -> u32 {
        self.0 & Self::PERMISSION_MASK
    }

    /// Classifies the type field.
    pub fn file_type(self) -> FileType {
        match self.0 & Self::TYPE_MASK {
            Self::DIRECTORY => FileType::Directory,
            Self::REGULAR => FileType::Regular,
            _ => FileType::Other,
        }
    }

    /// True when the type field is exactly "directory".
    pub fn is_dir(self) -> bool {
        self.0 & Self::TYPE_MASK == Self::DIRECTORY
    }

    /// True when the type field is exactly "regular file".
    pub fn is_regular(self) -> bool {
        self.0 & Self::TYPE_MASK == Self::REGULAR
    }

    /// Renders the classic 10-character form, e.g. `drwxr-xr-x`.
    ///
    /// Types other than directory and regular file render as `?`.
    pub fn to_symbolic_string(self) -> String {
        const RWX: &[u8; 9] = b"rwxrwxrwx";

        let mut out = String::with_capacity(10);
        out.push(match self.file_type() {
            FileType::Directory => 'd',
            FileType::Regular => '-',
            FileType::Other => '?',
        });
        for (i, c) in RWX.iter().enumerate() {
            if self.0 & (1 << (8 - i)) != 0 {
                out.push(*c as char);
            } else {
                out.push('-');
            }
        }
        out
    }
}

impl fmt::Display for FileMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_symbolic_string())
    }
}

impl From<u32> for FileMode {
    fn from(bits: u32) -> Self {
        FileMode(bits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_rendering() {
        let mode = FileMode(FileMode::DIRECTORY | 0o755);
        assert!(mode.is_dir());
        assert!(!mode.is_regular());
        assert_eq!(mode.to_symbolic_string(), "drwxr-xr-x");
        assert_eq!(mode.to_string(), "drwxr-xr-x");
    }

    #[test]
    fn test_regular_rendering() {
        let mode = FileMode(FileMode::REGULAR | 0o644);
        assert!(mode.is_regular());
        assert!(!mode.is_dir());
        assert_eq!(mode.file_type(), FileType::Regular);
        assert_eq!(mode.to_symbolic_string(), "-rw-r--r--");
        assert_eq!(mode.permissions(), 0o644);
    }

    #[test]
    fn test_other_types() {
        // symlink
        let mode = FileMode(0o120777);
        assert_eq!(mode.file_type(), FileType::Other);
        assert!(!mode.is_dir());
        assert!(!mode.is_regular());
        assert_eq!(mode.to_symbolic_string(), "?rwxrwxrwx");
    }

    #[test]
    fn test_permission_bits_msb_first() {
        assert_eq!(
            FileMode(FileMode::REGULAR | FileMode::USER_READ).to_symbolic_string(),
            "-r--------"
        );
        assert_eq!(
            FileMode(FileMode::REGULAR | FileMode::OTHER_EXEC).to_symbolic_string(),
            "---------x"
        );
        assert_eq!(FileMode::default().to_symbolic_string(), "?---------");
    }
}
