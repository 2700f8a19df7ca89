//! SFTP session: handshake, request ids and the multi-step operations.

use super::config::SessionConfig;
use super::connection::SubsystemChannel;
use super::dispatcher::Dispatcher;
use super::logging::{log_close_failure, log_handshake};
use super::message::{SftpMessage, SftpMessageType, HANDSHAKE_ID, SFTP_VERSION};
use super::types::{FileNode, FileOpenFlags, Handle, StatusCode};
use super::visitor::{walk_tree, Visitor};
use super::writer::PacketWriter;
use parking_lot::Mutex;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::process::Child;
use tracing::{debug, info, warn};
use usftp_platform::{UsftpError, UsftpResult};

/// How long [`Session::close`] waits for the transport process to exit
/// before killing it.
const CHILD_EXIT_TIMEOUT: Duration = Duration::from_secs(5);

type FindFuture<'a> = Pin<Box<dyn Future<Output = UsftpResult<Vec<FileNode>>> + Send + 'a>>;

/// A handle close that failed after the operation itself finished.
#[derive(Debug)]
pub struct CleanupWarning {
    /// Path the handle was opened for
    pub path: String,
    /// Why the close failed
    pub error: UsftpError,
}

/// An initialized SFTP v3 session.
///
/// All operations take `&self` and may run concurrently; responses are
/// matched to callers by request id.
pub struct Session {
    writer: PacketWriter,
    dispatcher: Dispatcher,
    next_request_id: AtomicU32,
    config: SessionConfig,
    server_version: u32,
    server_extensions: Vec<(String, String)>,
    cleanup_warnings: Mutex<Vec<CleanupWarning>>,
    child: Mutex<Option<Child>>,
}

impl Session {
    /// Starts a session over an open subsystem channel and performs the
    /// version handshake.
    pub async fn start(channel: SubsystemChannel, config: SessionConfig) -> UsftpResult<Self> {
        let SubsystemChannel {
            reader,
            writer,
            child,
        } = channel;

        config.validate()?;
        let mut session = Self {
            writer: PacketWriter::from_boxed(writer),
            dispatcher: Dispatcher::start(reader, config.max_packet_size),
            next_request_id: AtomicU32::new(1),
            config,
            server_version: 0,
            server_extensions: Vec::new(),
            cleanup_warnings: Mutex::new(Vec::new()),
            child: Mutex::new(child),
        };

        session.initialize().await?;
        Ok(session)
    }

    /// Starts a session over any duplex byte stream.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// # use usftp_proto::sftp::{Session, SessionConfig};
    /// # async fn example(stream: tokio::net::TcpStream) -> Result<(), Box<dyn std::error::Error>> {
    /// let (reader, writer) = stream.into_split();
    /// let session = Session::from_io(reader, writer, SessionConfig::default()).await?;
    /// for node in session.ls("/").await? {
    ///     println!("{} {}", node.attrs().permissions.unwrap_or_default(), node.filename());
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn from_io<R, W>(reader: R, writer: W, config: SessionConfig) -> UsftpResult<Self>
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self::start(SubsystemChannel::from_io(reader, writer), config).await
    }

    /// Send SSH_FXP_INIT under the reserved id and wait for SSH_FXP_VERSION.
    async fn initialize(&mut self) -> UsftpResult<()> {
        debug!("Initializing SFTP protocol");

        let reply = self
            .request(SftpMessage::Init {
                version: SFTP_VERSION,
            })
            .await?;

        match reply {
            SftpMessage::Version {
                version,
                extensions,
            } if version == SFTP_VERSION => {
                log_handshake(version, extensions.len());
                self.server_version = version;
                self.server_extensions = extensions;
                Ok(())
            }
            SftpMessage::Version { version, .. } => Err(UsftpError::VersionMismatch {
                expected: SFTP_VERSION,
                actual: version,
            }),
            other => Err(unexpected(SftpMessageType::Version, &other)),
        }
    }

    /// Allocates the next request id. Never returns the handshake id.
    pub fn next_request_id(&self) -> u32 {
        loop {
            let id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
            if id != HANDSHAKE_ID {
                return id;
            }
        }
    }

    /// Version reported by the server.
    pub fn server_version(&self) -> u32 {
        self.server_version
    }

    /// Extension pairs announced in the server's version reply.
    pub fn server_extensions(&self) -> &[(String, String)] {
        &self.server_extensions
    }

    /// Configuration this session runs with.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Takes the close failures collected so far.
    pub fn cleanup_warnings(&self) -> Vec<CleanupWarning> {
        std::mem::take(&mut *self.cleanup_warnings.lock())
    }

    /// Register, write, wait. The slot exists before the request is on the
    /// wire.
    async fn request(&self, message: SftpMessage) -> UsftpResult<SftpMessage> {
        let id = message.request_id().unwrap_or(HANDSHAKE_ID);
        let pending = self.dispatcher.register(id)?;

        if let Err(e) = self.writer.write(&message).await {
            if e.is_fatal() {
                warn!(request_id = id, error = %e, "SFTP transport write failed");
                self.dispatcher.abort();
            }
            return Err(e);
        }

        pending.recv(self.config.request_timeout).await
    }

    async fn open_handle(&self, message: SftpMessage) -> UsftpResult<Handle> {
        match self.request(message).await? {
            SftpMessage::Handle { handle, .. } => Ok(handle),
            SftpMessage::Status { code, message, .. } => Err(UsftpError::RemoteStatus { code, message }),
            other => Err(unexpected(SftpMessageType::Handle, &other)),
        }
    }

    /// Best-effort close. Failures are logged and kept as warnings.
    async fn close_handle(&self, path: &str, handle: Handle) {
        let id = self.next_request_id();
        let result = match self.request(SftpMessage::Close { id, handle }).await {
            Ok(SftpMessage::Status { code, .. }) if code == StatusCode::Ok as u32 => Ok(()),
            Ok(SftpMessage::Status { code, message, .. }) => {
                Err(UsftpError::RemoteStatus { code, message })
            }
            Ok(other) => Err(unexpected(SftpMessageType::Status, &other)),
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => debug!(request_id = id, path = path, "SFTP handle closed"),
            Err(error) => {
                log_close_failure(path, &error);
                self.cleanup_warnings.lock().push(CleanupWarning {
                    path: path.to_string(),
                    error,
                });
            }
        }
    }

    /// Lists a directory.
    ///
    /// Entries, `.` and `..` included, are returned sorted by filename. The
    /// directory handle is closed on every exit path.
    ///
    /// # Arguments
    ///
    /// * `path` - Directory path
    pub async fn ls(&self, path: &str) -> UsftpResult<Vec<FileNode>> {
        debug!(path = path, "Listing directory");

        let handle = self
            .open_handle(SftpMessage::OpenDir {
                id: self.next_request_id(),
                path: path.to_string(),
            })
            .await?;
        debug!(path = path, handle_len = handle.as_bytes().len(), "Directory opened");

        let result = self.read_dir(path, &handle).await;
        self.close_handle(path, handle).await;

        let mut nodes = result?;
        nodes.sort_by(|a, b| a.filename().cmp(b.filename()));
        Ok(nodes)
    }

    async fn read_dir(&self, path: &str, handle: &Handle) -> UsftpResult<Vec<FileNode>> {
        let mut nodes = Vec::new();
        loop {
            let reply = self
                .request(SftpMessage::ReadDir {
                    id: self.next_request_id(),
                    handle: handle.clone(),
                })
                .await?;

            match reply {
                SftpMessage::Name { entries, .. } => {
                    nodes.extend(entries.into_iter().map(|entry| FileNode::new(path, entry)));
                }
                SftpMessage::Status { code, .. } if code == StatusCode::Eof as u32 => {
                    return Ok(nodes);
                }
                SftpMessage::Status { code, message, .. } => {
                    return Err(UsftpError::RemoteStatus { code, message });
                }
                other => return Err(unexpected(SftpMessageType::Name, &other)),
            }
        }
    }

    /// Lists a directory tree.
    ///
    /// Every directory entry other than `.` and `..` gets its own listing
    /// attached as children.
    pub fn find<'a>(&'a self, path: &'a str) -> FindFuture<'a> {
        Box::pin(async move {
            let mut nodes = self.ls(path).await?;
            for node in nodes.iter_mut() {
                if node.is_dot() || !node.is_dir() {
                    continue;
                }
                let child_path = node.full_path();
                node.children = self.find(&child_path).await?;
            }
            Ok(nodes)
        })
    }

    /// Downloads a file into `sink`, returning the number of bytes written.
    ///
    /// Each READ starts where the previous DATA reply ended, so a server
    /// returning less than `chunk_size` never leaves a gap. An empty DATA
    /// reply fails the download with [`UsftpError::UnexpectedMessage`]. The
    /// file handle is closed on every exit path.
    ///
    /// # Arguments
    ///
    /// * `path` - Remote file path
    /// * `sink` - Destination for the file contents
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// # use usftp_proto::sftp::Session;
    /// # async fn example(session: &Session) -> Result<(), Box<dyn std::error::Error>> {
    /// let mut file = tokio::fs::File::create("file1.txt").await?;
    /// session.get("/share/file1.txt", &mut file).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn get<W>(&self, path: &str, sink: &mut W) -> UsftpResult<u64>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        debug!(path = path, "Downloading file");

        let handle = self
            .open_handle(SftpMessage::Open {
                id: self.next_request_id(),
                filename: path.to_string(),
                pflags: FileOpenFlags::READ,
            })
            .await?;

        let result = self.read_file(&handle, sink).await;
        self.close_handle(path, handle).await;

        let written = result?;
        debug!(path = path, bytes = written, "Download complete");
        Ok(written)
    }

    async fn read_file<W>(&self, handle: &Handle, sink: &mut W) -> UsftpResult<u64>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let mut offset = 0u64;
        loop {
            let reply = self
                .request(SftpMessage::Read {
                    id: self.next_request_id(),
                    handle: handle.clone(),
                    offset,
                    len: self.config.chunk_size,
                })
                .await?;

            match reply {
                SftpMessage::Data { data, .. } => {
                    if data.is_empty() {
                        return Err(UsftpError::UnexpectedMessage(format!(
                            "empty DATA at offset {}",
                            offset
                        )));
                    }
                    sink.write_all(&data).await?;
                    offset += data.len() as u64;
                }
                SftpMessage::Status { code, .. } if code == StatusCode::Eof as u32 => break,
                SftpMessage::Status { code, .. }
                    if code == StatusCode::Ok as u32 && self.config.treat_ok_as_eof =>
                {
                    break
                }
                SftpMessage::Status { code, message, .. } => {
                    return Err(UsftpError::RemoteStatus { code, message });
                }
                other => return Err(unexpected(SftpMessageType::Data, &other)),
            }
        }

        sink.flush().await?;
        Ok(offset)
    }

    /// Downloads a file into memory.
    pub async fn get_to_vec(&self, path: &str) -> UsftpResult<Vec<u8>> {
        let mut contents = Vec::new();
        self.get(path, &mut contents).await?;
        Ok(contents)
    }

    /// Walks the tree under `path` depth first, offering every entry other
    /// than `.` and `..` to `visitor` exactly once.
    pub async fn walk<V>(&self, path: &str, visitor: &mut V) -> UsftpResult<()>
    where
        V: Visitor + ?Sized,
    {
        let tree = self.find(path).await?;
        walk_tree(&tree, visitor);
        Ok(())
    }

    /// Cancels the session. Operations waiting for a response fail with
    /// [`UsftpError::Cancelled`], as does anything issued afterwards.
    pub fn cancel(&self) {
        info!("SFTP session cancelled");
        self.dispatcher.cancel();
    }

    /// Closes the session.
    ///
    /// Shuts down the write half, stops the reader (anything still waiting
    /// fails with [`UsftpError::SessionClosed`]) and reaps the transport
    /// process if there is one.
    pub async fn close(self) -> UsftpResult<()> {
        let shutdown = self.writer.shutdown().await;
        self.dispatcher.shutdown().await;

        let child = self.child.lock().take();
        if let Some(child) = child {
            reap(child).await;
        }

        info!("SFTP session closed");
        shutdown
    }
}

async fn reap(mut child: Child) {
    match tokio::time::timeout(CHILD_EXIT_TIMEOUT, child.wait()).await {
        Ok(Ok(status)) => debug!(status = %status, "Transport process exited"),
        Ok(Err(e)) => warn!(error = %e, "Failed to wait for transport process"),
        Err(_) => {
            warn!("Transport process did not exit, killing it");
            if let Err(e) = child.kill().await {
                warn!(error = %e, "Failed to kill transport process");
            }
        }
    }
}

fn unexpected(expected: SftpMessageType, got: &SftpMessage) -> UsftpError {
    UsftpError::UnexpectedMessage(format!(
        "expected {:?}, got {:?}",
        expected,
        got.msg_type()
    ))
}
