//! SFTP response dispatcher.
//!
//! A single background task owns the read half of the stream. It decodes
//! each packet and hands the message to the waiter registered under the
//! message's request id (the handshake reply, which has no id, goes to
//! [`HANDSHAKE_ID`]).
//!
//! Waiters register *before* their request is written, so a response can
//! never arrive ahead of its slot. A slot is removed exactly once: either
//! the reader takes it to deliver, or the waiter drops it (timeout or
//! cancellation). When the reader stops, every remaining slot is resolved
//! with an error so nobody waits forever.

use super::logging::{log_orphan_response, log_reader_stopped, log_response_routed};
use super::message::{peek_request_id, SftpMessage, SftpMessageType, HANDSHAKE_ID};
use super::packet::read_packet;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncRead;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use usftp_platform::{UsftpError, UsftpResult};

type Slot = oneshot::Sender<UsftpResult<SftpMessage>>;

/// Why the reader stopped accepting work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shutdown {
    /// Session-wide cancellation
    Cancelled,
    /// Stream ended, failed, or the session was closed
    Closed,
}

impl Shutdown {
    fn error(self) -> UsftpError {
        match self {
            Shutdown::Cancelled => UsftpError::Cancelled,
            Shutdown::Closed => UsftpError::SessionClosed,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Shutdown::Cancelled => "cancelled",
            Shutdown::Closed => "closed",
        }
    }
}

#[derive(Default)]
struct PendingState {
    slots: HashMap<u32, Slot>,
    shutdown: Option<Shutdown>,
}

/// Table of requests awaiting a response: request id -> one-shot slot.
#[derive(Default)]
pub struct PendingRequests {
    state: Mutex<PendingState>,
}

impl PendingRequests {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a slot for `id`. Fails once the reader has stopped, or if
    /// `id` is already in flight.
    fn insert(&self, id: u32) -> UsftpResult<oneshot::Receiver<UsftpResult<SftpMessage>>> {
        let mut state = self.state.lock();
        if let Some(reason) = state.shutdown {
            return Err(reason.error());
        }
        if state.slots.contains_key(&id) {
            return Err(UsftpError::InvalidRequest(format!(
                "request id {} already in flight",
                id
            )));
        }
        let (tx, rx) = oneshot::channel();
        state.slots.insert(id, tx);
        Ok(rx)
    }

    /// Hands `result` to the waiter for `id`. Returns false if no waiter is
    /// registered.
    fn deliver(&self, id: u32, result: UsftpResult<SftpMessage>) -> bool {
        let slot = self.state.lock().slots.remove(&id);
        match slot {
            // A dropped receiver means the waiter gave up after we took the
            // slot; the response is discarded either way.
            Some(tx) => {
                let _ = tx.send(result);
                true
            }
            None => false,
        }
    }

    fn remove(&self, id: u32) {
        self.state.lock().slots.remove(&id);
    }

    /// Rejects all outstanding slots and refuses new ones.
    fn close(&self, reason: Shutdown) -> usize {
        let drained: Vec<Slot> = {
            let mut state = self.state.lock();
            state.shutdown.get_or_insert(reason);
            state.slots.drain().map(|(_, tx)| tx).collect()
        };
        let count = drained.len();
        for tx in drained {
            let _ = tx.send(Err(reason.error()));
        }
        count
    }

    /// Number of requests in flight.
    pub fn len(&self) -> usize {
        self.state.lock().slots.len()
    }

    /// True when nothing is in flight.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A registered wait for one response.
///
/// Dropping it (including via timeout) removes the slot from the table.
pub struct PendingResponse {
    id: u32,
    rx: oneshot::Receiver<UsftpResult<SftpMessage>>,
    pending: Arc<PendingRequests>,
}

impl PendingResponse {
    /// Request id this wait is registered under.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Waits for the response, optionally bounded by `timeout`.
    pub async fn recv(mut self, timeout: Option<Duration>) -> UsftpResult<SftpMessage> {
        let received = match timeout {
            Some(limit) => match tokio::time::timeout(limit, &mut self.rx).await {
                Ok(received) => received,
                Err(_) => {
                    debug!(request_id = self.id, "SFTP request timed out");
                    return Err(UsftpError::Timeout);
                }
            },
            None => (&mut self.rx).await,
        };

        // Sender dropped without a value: the table was torn down
        received.unwrap_or(Err(UsftpError::SessionClosed))
    }
}

impl Drop for PendingResponse {
    fn drop(&mut self) {
        self.pending.remove(self.id);
    }
}

/// Owns the reader task and the pending-request table.
pub struct Dispatcher {
    pending: Arc<PendingRequests>,
    cancel: CancellationToken,
    task_handle: Mutex<Option<JoinHandle<()>>>,
}

impl Dispatcher {
    /// Spawns the reader task over `reader`.
    pub fn start<R>(reader: R, max_packet_size: u32) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        let pending = Arc::new(PendingRequests::new());
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(Self::run(
            reader,
            Arc::clone(&pending),
            cancel.clone(),
            max_packet_size,
        ));

        Self {
            pending,
            cancel,
            task_handle: Mutex::new(Some(handle)),
        }
    }

    async fn run<R>(
        mut reader: R,
        pending: Arc<PendingRequests>,
        cancel: CancellationToken,
        max_packet_size: u32,
    ) where
        R: AsyncRead + Send + Unpin,
    {
        debug!("SFTP reader started");

        let reason = loop {
            let packet = tokio::select! {
                _ = cancel.cancelled() => break Shutdown::Cancelled,
                packet = read_packet(&mut reader, max_packet_size) => packet,
            };

            let packet = match packet {
                Ok(packet) => packet,
                Err(UsftpError::Io(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    debug!("SFTP stream reached EOF");
                    break Shutdown::Closed;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to read SFTP packet");
                    break Shutdown::Closed;
                }
            };

            match SftpMessage::from_packet(&packet) {
                Ok(message) => {
                    let id = message.request_id().unwrap_or(HANDSHAKE_ID);
                    let msg_type = message.msg_type();
                    if pending.deliver(id, Ok(message)) {
                        log_response_routed(id, msg_type);
                    } else {
                        log_orphan_response(id, Some(msg_type));
                    }
                }
                Err(e) => {
                    // Decode failures only fail the request they answer
                    let id = peek_request_id(&packet).unwrap_or(HANDSHAKE_ID);
                    warn!(request_id = id, error = %e, "Failed to decode SFTP message");
                    if !pending.deliver(id, Err(e)) {
                        log_orphan_response(id, SftpMessageType::from_u8(packet.msg_type()));
                    }
                }
            }
        };

        let rejected = pending.close(reason);
        log_reader_stopped(reason.as_str(), rejected);
    }

    /// Registers a wait for the response to request `id`.
    ///
    /// Must be called before the request is written.
    pub fn register(&self, id: u32) -> UsftpResult<PendingResponse> {
        let rx = self.pending.insert(id)?;
        Ok(PendingResponse {
            id,
            rx,
            pending: Arc::clone(&self.pending),
        })
    }

    /// Number of requests awaiting a response.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Returns whether the reader task is still running.
    pub fn is_running(&self) -> bool {
        self.task_handle
            .lock()
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Signals the reader to stop. Outstanding waits resolve with
    /// [`UsftpError::Cancelled`].
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Marks the session unusable without waiting for the reader. Outstanding
    /// and future waits resolve with [`UsftpError::SessionClosed`].
    pub fn abort(&self) {
        self.pending.close(Shutdown::Closed);
        self.cancel.cancel();
    }

    /// Closes the table, stops the reader and waits for it to exit.
    /// Outstanding waits resolve with [`UsftpError::SessionClosed`].
    pub async fn shutdown(&self) {
        self.abort();

        let handle = self.task_handle.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "SFTP reader task failed");
            }
        }

    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
