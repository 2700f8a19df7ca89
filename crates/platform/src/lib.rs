//! # usftp platform
//!
//! Shared types for the usftp SFTP client crates.
//!
//! This crate provides the unified error taxonomy (`UsftpError`,
//! `UsftpResult`) used by every layer of the protocol engine, from byte
//! decoding up to session operations.
//!
//! # Examples
//!
//! ```
//! use usftp_platform::{UsftpError, UsftpResult};
//!
//! fn lookup(found: bool) -> UsftpResult<u32> {
//!     if found {
//!         Ok(1)
//!     } else {
//!         Err(UsftpError::RemoteStatus { code: 2, message: "No such file".into() })
//!     }
//! }
//!
//! assert_eq!(lookup(true).unwrap(), 1);
//! assert!(lookup(false).unwrap_err().is_remote_status(2));
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod error;

pub use error::{UsftpError, UsftpResult};

/// Platform version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
