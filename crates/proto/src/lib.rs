//! SFTP v3 client protocol engine.
//!
//! This crate provides an asynchronous SFTP client that runs over any
//! authenticated duplex byte stream (by default, the system `ssh` client in
//! subsystem mode):
//!
//! - Packet framing and the SFTP v3 message catalog
//! - Concurrent request/response demultiplexing on one stream
//! - Directory listing, recursive discovery, download and change detection
//!
//! # Features
//!
//! - `sftp` (default) - SFTP client support
//! - `serde` - `Serialize`/`Deserialize` for the file tree types
//!
//! # Example
//!
//! ```rust
//! use usftp_proto::sftp::{SftpMessage, StatusCode};
//!
//! // Serialize a status reply and parse it back
//! let status = SftpMessage::status(7, StatusCode::Eof);
//! let wire_format = status.to_bytes().unwrap();
//!
//! let parsed = SftpMessage::from_bytes(&wire_format).unwrap();
//! assert_eq!(parsed.request_id(), Some(7));
//! ```
//!
//! # References
//!
//! - [draft-ietf-secsh-filexfer-02](https://datatracker.ietf.org/doc/html/draft-ietf-secsh-filexfer-02) - SSH File Transfer Protocol, version 3

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

#[cfg(feature = "sftp")]
pub mod sftp;
