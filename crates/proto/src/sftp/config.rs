//! Session and connection configuration.
//!
//! Provides [`SessionConfig`] with defaults matching common server limits and a
//! validating builder, and [`ConnectParams`] for the OpenSSH transport.

use super::packet::DEFAULT_MAX_PACKET_SIZE;
use std::path::PathBuf;
use std::time::Duration;
use usftp_platform::{UsftpError, UsftpResult};

/// Default read chunk for downloads (255 KiB, below the usual 256 KiB
/// server packet limit).
pub const DEFAULT_CHUNK_SIZE: u32 = 255 * 1024;

/// DATA header overhead: length, type, id and the data length prefix.
const DATA_OVERHEAD: u32 = 4 + 1 + 4 + 4;

/// Tunables for a [`super::session::Session`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Bytes requested per READ during a download
    pub chunk_size: u32,

    /// Treat a STATUS OK received while reading a file as end of file.
    ///
    /// Some servers answer the read past the last byte with OK instead of
    /// EOF. Disable for strict handling, where OK becomes an error.
    pub treat_ok_as_eof: bool,

    /// Upper bound on the wait for any single response. `None` waits until
    /// the session is closed.
    pub request_timeout: Option<Duration>,

    /// Largest inbound packet accepted by the reader
    pub max_packet_size: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            treat_ok_as_eof: true,
            request_timeout: None,
            max_packet_size: DEFAULT_MAX_PACKET_SIZE,
        }
    }
}

impl SessionConfig {
    /// Create builder for session configuration
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder::new()
    }

    /// Validate configuration
    pub fn validate(&self) -> UsftpResult<()> {
        if self.chunk_size == 0 {
            return Err(UsftpError::Config("chunk_size cannot be zero".into()));
        }
        if self.chunk_size.saturating_add(DATA_OVERHEAD) > self.max_packet_size {
            return Err(UsftpError::Config(format!(
                "chunk_size {} does not fit in max_packet_size {}",
                self.chunk_size, self.max_packet_size
            )));
        }
        if self.request_timeout == Some(Duration::ZERO) {
            return Err(UsftpError::Config("request_timeout cannot be zero".into()));
        }
        Ok(())
    }
}

/// Builder for SessionConfig
#[derive(Debug, Default)]
pub struct SessionConfigBuilder {
    chunk_size: Option<u32>,
    treat_ok_as_eof: Option<bool>,
    request_timeout: Option<Duration>,
    max_packet_size: Option<u32>,
}

impl SessionConfigBuilder {
    /// Create new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set download chunk size
    pub fn with_chunk_size(mut self, chunk_size: u32) -> Self {
        self.chunk_size = Some(chunk_size);
        self
    }

    /// Set whether STATUS OK ends a download
    pub fn with_treat_ok_as_eof(mut self, enabled: bool) -> Self {
        self.treat_ok_as_eof = Some(enabled);
        self
    }

    /// Require strict EOF handling during downloads
    pub fn strict_eof(self) -> Self {
        self.with_treat_ok_as_eof(false)
    }

    /// Set per-request timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Set inbound packet size limit
    pub fn with_max_packet_size(mut self, size: u32) -> Self {
        self.max_packet_size = Some(size);
        self
    }

    /// Build SessionConfig with validation
    pub fn build(self) -> UsftpResult<SessionConfig> {
        let defaults = SessionConfig::default();
        let config = SessionConfig {
            chunk_size: self.chunk_size.unwrap_or(defaults.chunk_size),
            treat_ok_as_eof: self.treat_ok_as_eof.unwrap_or(defaults.treat_ok_as_eof),
            request_timeout: self.request_timeout.or(defaults.request_timeout),
            max_packet_size: self.max_packet_size.unwrap_or(defaults.max_packet_size),
        };

        config.validate()?;
        Ok(config)
    }
}

/// Default SSH port
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Where and as whom to open the SFTP subsystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectParams {
    /// Remote user
    pub user: String,
    /// Remote host name or address
    pub host: String,
    /// Remote SSH port
    pub port: u16,
    /// Private key used for authentication
    pub identity_file: Option<PathBuf>,
    /// SSH client binary
    pub ssh_program: PathBuf,
    /// Extra arguments passed to the SSH client before the destination
    pub extra_args: Vec<String>,
}

impl ConnectParams {
    /// Creates parameters for `user@host:port` authenticating with the key
    /// file `credential`.
    pub fn new(
        user: impl Into<String>,
        host: impl Into<String>,
        port: u16,
        credential: impl Into<PathBuf>,
    ) -> Self {
        Self {
            user: user.into(),
            host: host.into(),
            port,
            identity_file: Some(credential.into()),
            ssh_program: PathBuf::from("ssh"),
            extra_args: Vec::new(),
        }
    }

    /// Use a different SSH client binary
    pub fn with_ssh_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.ssh_program = program.into();
        self
    }

    /// Append an argument for the SSH client
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.extra_args.push(arg.into());
        self
    }

    /// Rely on the SSH agent or client config instead of a key file
    pub fn without_identity_file(mut self) -> Self {
        self.identity_file = None;
        self
    }

    /// Validate parameters
    pub fn validate(&self) -> UsftpResult<()> {
        if self.user.is_empty() {
            return Err(UsftpError::Config("user cannot be empty".into()));
        }
        if self.host.is_empty() {
            return Err(UsftpError::Config("host cannot be empty".into()));
        }
        if self.host.starts_with('-') || self.user.starts_with('-') {
            return Err(UsftpError::Config(format!(
                "invalid destination {}@{}",
                self.user, self.host
            )));
        }
        if self.port == 0 {
            return Err(UsftpError::Config("port cannot be zero".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = SessionConfig::default();
        assert_eq!(config.chunk_size, 255 * 1024);
        assert!(config.treat_ok_as_eof);
        assert!(config.request_timeout.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = SessionConfig::builder()
            .with_chunk_size(4096)
            .with_request_timeout(Duration::from_secs(5))
            .strict_eof()
            .build()
            .unwrap();

        assert_eq!(config.chunk_size, 4096);
        assert_eq!(config.request_timeout, Some(Duration::from_secs(5)));
        assert!(!config.treat_ok_as_eof);
        assert_eq!(config.max_packet_size, DEFAULT_MAX_PACKET_SIZE);
    }

    #[test]
    fn test_builder_rejects_invalid() {
        assert!(matches!(
            SessionConfig::builder().with_chunk_size(0).build(),
            Err(UsftpError::Config(_))
        ));
        assert!(SessionConfig::builder()
            .with_chunk_size(64 * 1024)
            .with_max_packet_size(32 * 1024)
            .build()
            .is_err());
        assert!(SessionConfig::builder()
            .with_request_timeout(Duration::ZERO)
            .build()
            .is_err());
    }

    #[test]
    fn test_connect_params() {
        let params = ConnectParams::new("test", "localhost", 2222, "/keys/id_ed25519")
            .with_arg("-oStrictHostKeyChecking=no");

        assert_eq!(params.ssh_program, PathBuf::from("ssh"));
        assert_eq!(params.identity_file, Some(PathBuf::from("/keys/id_ed25519")));
        assert_eq!(params.extra_args.len(), 1);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_connect_params_rejects_invalid() {
        assert!(ConnectParams::new("", "localhost", 22, "k").validate().is_err());
        assert!(ConnectParams::new("u", "", 22, "k").validate().is_err());
        assert!(ConnectParams::new("u", "-oProxyCommand=x", 22, "k")
            .validate()
            .is_err());
        assert!(ConnectParams::new("u", "localhost", 0, "k").validate().is_err());
    }
}
