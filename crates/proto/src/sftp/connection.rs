//! Transport boundary: opening the `sftp` subsystem over an authenticated
//! SSH connection.
//!
//! The secure channel itself is provided by something else. By default the
//! system OpenSSH client is launched with `-s sftp`, and its stdin and stdout
//! become the SFTP stream. Any other transport can plug in through
//! [`SubsystemConnector`].

use super::config::{ConnectParams, SessionConfig, DEFAULT_SSH_PORT};
use super::session::Session;
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::{Child, Command};
use tracing::{debug, info};
use usftp_platform::{UsftpError, UsftpResult};

/// Name of the SFTP subsystem.
pub const SFTP_SUBSYSTEM: &str = "sftp";

/// Both halves of a subsystem stream, plus the process serving it if any.
pub struct SubsystemChannel {
    /// Bytes from the server
    pub reader: Box<dyn AsyncRead + Send + Unpin>,
    /// Bytes to the server
    pub writer: Box<dyn AsyncWrite + Send + Unpin>,
    /// Transport process, reaped when the session closes
    pub child: Option<Child>,
}

impl SubsystemChannel {
    /// Wraps an arbitrary duplex pair.
    pub fn from_io<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            reader: Box::new(reader),
            writer: Box::new(writer),
            child: None,
        }
    }
}

impl std::fmt::Debug for SubsystemChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubsystemChannel")
            .field("child", &self.child.as_ref().and_then(Child::id))
            .finish_non_exhaustive()
    }
}

/// Opens subsystem channels on an authenticated SSH connection.
#[async_trait]
pub trait SubsystemConnector: Send + Sync {
    /// Starts subsystem `name` and returns its stream.
    async fn open_subsystem(&self, name: &str) -> UsftpResult<SubsystemChannel>;
}

/// Runs the system `ssh` client in subsystem mode.
#[derive(Debug, Clone)]
pub struct OpenSshConnector {
    params: ConnectParams,
}

impl OpenSshConnector {
    /// Creates a connector, validating `params`.
    pub fn new(params: ConnectParams) -> UsftpResult<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    /// Connection parameters.
    pub fn params(&self) -> &ConnectParams {
        &self.params
    }

    /// Builds the `ssh` invocation for subsystem `name`.
    pub fn command(&self, name: &str) -> Command {
        let params = &self.params;
        let mut cmd = Command::new(&params.ssh_program);

        cmd.arg("-oBatchMode=yes");
        if params.port != DEFAULT_SSH_PORT {
            cmd.arg("-p").arg(params.port.to_string());
        }
        if let Some(identity) = &params.identity_file {
            cmd.arg("-i").arg(identity);
        }
        cmd.args(&params.extra_args);
        cmd.arg("-s")
            .arg(format!("{}@{}", params.user, params.host))
            .arg(name);

        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::inherit());
        cmd.kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl SubsystemConnector for OpenSshConnector {
    async fn open_subsystem(&self, name: &str) -> UsftpResult<SubsystemChannel> {
        let mut child = self.command(name).spawn()?;
        debug!(
            host = %self.params.host,
            port = self.params.port,
            pid = ?child.id(),
            "Spawned ssh for subsystem {}", name
        );

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| UsftpError::Config("ssh stdout not captured".into()))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| UsftpError::Config("ssh stdin not captured".into()))?;

        Ok(SubsystemChannel {
            reader: Box::new(stdout),
            writer: Box::new(stdin),
            child: Some(child),
        })
    }
}

/// An authenticated SSH connection that can host SFTP sessions.
pub struct Connection {
    connector: Arc<dyn SubsystemConnector>,
    config: SessionConfig,
    closed: AtomicBool,
}

impl Connection {
    /// Uses `connector` to open subsystem channels; sessions run with
    /// `config`.
    pub fn with_connector(connector: Arc<dyn SubsystemConnector>, config: SessionConfig) -> Self {
        Self {
            connector,
            config,
            closed: AtomicBool::new(false),
        }
    }

    /// Opens the `sftp` subsystem and performs the handshake.
    pub async fn new_session(&self) -> UsftpResult<Session> {
        if self.is_closed() {
            return Err(UsftpError::SessionClosed);
        }

        let channel = self.connector.open_subsystem(SFTP_SUBSYSTEM).await?;
        Session::start(channel, self.config.clone()).await
    }

    /// Returns whether [`Connection::close`] was called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Stops handing out sessions. Sessions already open keep running until
    /// closed. Calling it again is a no-op.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            info!("SFTP connection closed");
        }
    }
}

/// Connects to `user@host:port`, authenticating with the private key at
/// `credential`, through the system OpenSSH client.
///
/// # Example
///
/// ```rust,no_run
/// # use usftp_proto::sftp::connect;
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let conn = connect("test", "localhost", 2222, "/home/test/.ssh/id_ed25519")?;
/// let session = conn.new_session().await?;
/// let tree = session.find("/share").await?;
/// println!("{} entries", tree.len());
/// session.close().await?;
/// # Ok(())
/// # }
/// ```
pub fn connect(
    user: &str,
    host: &str,
    port: u16,
    credential: impl Into<PathBuf>,
) -> UsftpResult<Connection> {
    let connector = OpenSshConnector::new(ConnectParams::new(user, host, port, credential))?;
    Ok(Connection::with_connector(
        Arc::new(connector),
        SessionConfig::default(),
    ))
}
