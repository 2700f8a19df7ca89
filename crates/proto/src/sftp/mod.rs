//! SFTP (SSH File Transfer Protocol) client.
//!
//! This module implements the client side of SFTP v3 over an already
//! authenticated duplex byte stream.
//!
//! # Architecture
//!
//! ```text
//!   Session ops (ls, find, get, walk)
//!        |                  ^
//!   PacketWriter        Dispatcher (reader task)
//!        |                  |  id -> pending slot
//!        v                  |
//!   ============ SFTP stream ============
//! ```
//!
//! Every request registers a one-shot slot under its request id before it is
//! written. A single background task reads packets, decodes them into
//! [`SftpMessage`] and resolves the matching slot, so any number of
//! operations can be in flight on one session.
//!
//! # Protocol Flow
//!
//! ```text
//! Client                          Server
//!   |                               |
//!   |-- SSH_FXP_INIT -------------->|
//!   |<- SSH_FXP_VERSION ------------|
//!   |                               |
//!   |-- SSH_FXP_OPENDIR ----------->|
//!   |<- SSH_FXP_HANDLE -------------|
//!   |-- SSH_FXP_READDIR ----------->|
//!   |<- SSH_FXP_NAME ---------------|
//!   |-- SSH_FXP_READDIR ----------->|
//!   |<- SSH_FXP_STATUS (EOF) -------|
//!   |-- SSH_FXP_CLOSE ------------->|
//!   |<- SSH_FXP_STATUS (OK) --------|
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use usftp_proto::sftp::{connect, UnseenFileVisitor, Visitor};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let conn = connect("test", "localhost", 2222, "/home/test/.ssh/id_ed25519")?;
//! let session = conn.new_session().await?;
//!
//! // List directory
//! for node in session.ls("/share").await? {
//!     println!("{} {}", node.attrs().permissions.unwrap_or_default(), node.filename());
//! }
//!
//! // Download file
//! let contents = session.get_to_vec("/share/file1.txt").await?;
//!
//! // Find new or resized files
//! let mut visitor = UnseenFileVisitor::default();
//! session.walk("/share", &mut visitor).await?;
//! for node in visitor.files() {
//!     println!("new: {}", node.full_path());
//! }
//!
//! session.close().await?;
//! # let _ = contents;
//! # Ok(())
//! # }
//! ```
//!
//! # References
//!
//! - [SFTP Draft v3](https://datatracker.ietf.org/doc/html/draft-ietf-secsh-filexfer-02)

pub mod config;
pub mod connection;
pub mod dispatcher;
pub mod encoding;
pub mod filemode;
pub mod logging;
pub mod message;
pub mod packet;
pub mod session;
pub mod types;
pub mod visitor;
pub mod writer;

pub use config::{ConnectParams, SessionConfig, SessionConfigBuilder, DEFAULT_CHUNK_SIZE};
pub use connection::{connect, Connection, OpenSshConnector, SubsystemChannel, SubsystemConnector};
pub use filemode::{FileMode, FileType};
pub use message::{SftpMessage, SftpMessageType, SFTP_VERSION};
pub use packet::Packet;
pub use session::{CleanupWarning, Session};
pub use types::{FileAttributes, FileNode, FileOpenFlags, Handle, NameEntry, StatusCode};
pub use visitor::{snapshot, UnseenFileVisitor, Visitor};
