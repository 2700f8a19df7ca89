//! In-process SFTP v3 server for integration tests.
//!
//! Serves a small in-memory tree over `tokio::io::duplex`, counts handle
//! opens and closes, and can be told to misbehave.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncWriteExt, DuplexStream, WriteHalf};
use usftp_proto::sftp::packet::{read_packet, DEFAULT_MAX_PACKET_SIZE};
use usftp_proto::sftp::{
    FileAttributes, FileMode, Handle, NameEntry, Session, SessionConfig, SftpMessage, StatusCode,
};

pub const DIR_MODE: u32 = 0o040755;
pub const FILE_MODE: u32 = 0o100644;

/// Directory listings and file contents keyed by absolute path.
#[derive(Debug, Clone, Default)]
pub struct MockFs {
    dirs: HashMap<String, Vec<NameEntry>>,
    files: HashMap<String, Vec<u8>>,
}

fn entry(name: &str, mode: u32, size: u64) -> NameEntry {
    NameEntry::new(
        name,
        format!("{} 1 test test {} {}", FileMode(mode), size, name),
        FileAttributes {
            size: Some(size),
            uid: Some(1000),
            gid: Some(1000),
            permissions: Some(FileMode(mode)),
            atime: Some(1_700_000_000),
            mtime: Some(1_700_000_000),
            extended_count: None,
        },
    )
}

impl MockFs {
    /// ```text
    /// /share
    /// ├── dir
    /// │   ├── dir2
    /// │   │   └── file3.txt   "c"
    /// │   └── file2.txt       "b"
    /// └── file1.txt           "a"
    /// ```
    ///
    /// Listings are served unsorted.
    pub fn share() -> Self {
        let mut fs = Self::default();
        fs.dirs.insert(
            "/share".into(),
            vec![
                entry("file1.txt", FILE_MODE, 1),
                entry("dir", DIR_MODE, 4096),
                entry(".", DIR_MODE, 4096),
                entry("..", DIR_MODE, 4096),
            ],
        );
        fs.dirs.insert(
            "/share/dir".into(),
            vec![
                entry("file2.txt", FILE_MODE, 1),
                entry("..", DIR_MODE, 4096),
                entry("dir2", DIR_MODE, 4096),
                entry(".", DIR_MODE, 4096),
            ],
        );
        fs.dirs.insert(
            "/share/dir/dir2".into(),
            vec![
                entry(".", DIR_MODE, 4096),
                entry("file3.txt", FILE_MODE, 1),
                entry("..", DIR_MODE, 4096),
            ],
        );
        fs.files.insert("/share/file1.txt".into(), b"a".to_vec());
        fs.files.insert("/share/dir/file2.txt".into(), b"b".to_vec());
        fs.files.insert("/share/dir/dir2/file3.txt".into(), b"c".to_vec());
        fs
    }

    /// Adds a downloadable file that does not appear in any listing.
    pub fn with_file(mut self, path: &str, contents: Vec<u8>) -> Self {
        self.files.insert(path.into(), contents);
        self
    }
}

/// Ways the server can deviate from a well-behaved one.
#[derive(Debug, Clone, Default)]
pub struct Behaviour {
    /// Reply after a delay that depends on the request id, so concurrent
    /// requests are answered out of order
    pub jitter: bool,
    /// Never answer READ
    pub stall_reads: bool,
    /// Answer READDIR on this path with FAILURE
    pub fail_readdir: Option<String>,
    /// Answer READ at this offset with FAILURE
    pub fail_read_at: Option<u64>,
    /// Answer the read past the end with OK instead of EOF
    pub read_ends_with_ok: bool,
    /// Answer CLOSE with FAILURE
    pub fail_close: bool,
    /// Return at most this many bytes per READ
    pub max_read: Option<usize>,
    /// Hang up after this many requests
    pub hang_up_after: Option<usize>,
    /// Answer OPENDIR with SSH_FXP_ATTRS, a type the client never requests
    pub attrs_for_opendir: bool,
}

/// Counters observed by the server.
#[derive(Debug, Default)]
pub struct Stats {
    pub opened: AtomicUsize,
    pub closed: AtomicUsize,
    pub reads: AtomicUsize,
    pub requests: AtomicUsize,
}

impl Stats {
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

enum OpenHandle {
    Dir { path: String, listed: bool },
    File { path: String },
}

struct State {
    fs: MockFs,
    behaviour: Behaviour,
    handles: HashMap<Vec<u8>, OpenHandle>,
    next_handle: u32,
}

impl State {
    fn open(&mut self, handle: OpenHandle) -> Handle {
        self.next_handle += 1;
        let raw = format!("handle-{}", self.next_handle).into_bytes();
        self.handles.insert(raw.clone(), handle);
        Handle(raw)
    }

    fn respond(&mut self, request: SftpMessage, stats: &Stats) -> Option<SftpMessage> {
        let reply = match request {
            SftpMessage::Init { .. } => SftpMessage::Version {
                version: 3,
                extensions: vec![("limits@openssh.com".into(), "1".into())],
            },
            SftpMessage::OpenDir { id, path } => {
                if self.fs.dirs.contains_key(&path) {
                    stats.opened.fetch_add(1, Ordering::SeqCst);
                    let handle = self.open(OpenHandle::Dir { path, listed: false });
                    SftpMessage::Handle { id, handle }
                } else {
                    SftpMessage::status(id, StatusCode::NoSuchFile)
                }
            }
            SftpMessage::ReadDir { id, handle } => match self.handles.get_mut(&handle.0) {
                Some(OpenHandle::Dir { path, listed }) => {
                    if self.behaviour.fail_readdir.as_deref() == Some(path.as_str()) {
                        SftpMessage::status(id, StatusCode::Failure)
                    } else if *listed {
                        SftpMessage::status(id, StatusCode::Eof)
                    } else {
                        *listed = true;
                        SftpMessage::Name {
                            id,
                            entries: self.fs.dirs[path.as_str()].clone(),
                        }
                    }
                }
                _ => SftpMessage::status(id, StatusCode::Failure),
            },
            SftpMessage::Open { id, filename, .. } => {
                if self.fs.files.contains_key(&filename) {
                    stats.opened.fetch_add(1, Ordering::SeqCst);
                    let handle = self.open(OpenHandle::File { path: filename });
                    SftpMessage::Handle { id, handle }
                } else {
                    SftpMessage::status(id, StatusCode::NoSuchFile)
                }
            }
            SftpMessage::Read {
                id,
                handle,
                offset,
                len,
            } => {
                stats.reads.fetch_add(1, Ordering::SeqCst);
                if self.behaviour.stall_reads {
                    return None;
                }
                if self.behaviour.fail_read_at == Some(offset) {
                    return Some(SftpMessage::status(id, StatusCode::Failure));
                }
                match self.handles.get(&handle.0) {
                    Some(OpenHandle::File { path }) => {
                        let contents = &self.fs.files[path.as_str()];
                        let start = offset as usize;
                        if start >= contents.len() {
                            if self.behaviour.read_ends_with_ok {
                                SftpMessage::status(id, StatusCode::Ok)
                            } else {
                                SftpMessage::status(id, StatusCode::Eof)
                            }
                        } else {
                            let mut end = contents.len().min(start + len as usize);
                            if let Some(max) = self.behaviour.max_read {
                                end = end.min(start + max);
                            }
                            SftpMessage::Data {
                                id,
                                data: contents[start..end].to_vec().into(),
                            }
                        }
                    }
                    _ => SftpMessage::status(id, StatusCode::Failure),
                }
            }
            SftpMessage::Close { id, handle } => {
                if self.handles.remove(&handle.0).is_none() {
                    SftpMessage::status(id, StatusCode::Failure)
                } else {
                    stats.closed.fetch_add(1, Ordering::SeqCst);
                    if self.behaviour.fail_close {
                        SftpMessage::status(id, StatusCode::Failure)
                    } else {
                        SftpMessage::status(id, StatusCode::Ok)
                    }
                }
            }
            other => panic!("client sent a server message: {:?}", other),
        };
        Some(reply)
    }
}

async fn send(writer: &tokio::sync::Mutex<WriteHalf<DuplexStream>>, reply: SftpMessage) {
    let frame = reply.to_bytes().expect("encode reply");
    // The client may already be gone
    let _ = writer.lock().await.write_all(&frame).await;
}

/// Runs the server on one end of a duplex pair and returns the other end.
pub fn spawn_server(fs: MockFs, behaviour: Behaviour) -> (DuplexStream, Arc<Stats>) {
    let (client, server) = tokio::io::duplex(64 * 1024);
    let stats = Arc::new(Stats::default());

    let task_stats = Arc::clone(&stats);
    tokio::spawn(async move {
        let (mut reader, writer) = tokio::io::split(server);
        let writer = Arc::new(tokio::sync::Mutex::new(writer));
        let hang_up_after = behaviour.hang_up_after;
        let attrs_for_opendir = behaviour.attrs_for_opendir;
        let jitter = behaviour.jitter;
        let state = Mutex::new(State {
            fs,
            behaviour,
            handles: HashMap::new(),
            next_handle: 0,
        });

        while let Ok(packet) = read_packet(&mut reader, DEFAULT_MAX_PACKET_SIZE).await {
            let served = task_stats.requests.fetch_add(1, Ordering::SeqCst);
            if hang_up_after == Some(served) {
                break;
            }

            let request = SftpMessage::from_packet(&packet).expect("decode request");
            let id = request.request_id().unwrap_or(0);

            if attrs_for_opendir && matches!(request, SftpMessage::OpenDir { .. }) {
                // SSH_FXP_ATTRS: id plus an empty attribute flag word
                let mut frame = vec![0, 0, 0, 9, 105];
                frame.extend_from_slice(&id.to_be_bytes());
                frame.extend_from_slice(&[0, 0, 0, 0]);
                let _ = writer.lock().await.write_all(&frame).await;
                continue;
            }

            let reply = state.lock().unwrap().respond(request, &task_stats);
            let Some(reply) = reply else { continue };

            if jitter {
                let writer = Arc::clone(&writer);
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_millis(u64::from(id % 4) * 5)).await;
                    send(&writer, reply).await;
                });
            } else {
                send(&writer, reply).await;
            }
        }
    });

    (client, stats)
}

/// Starts a mock server and a session connected to it.
pub async fn start_session(
    fs: MockFs,
    behaviour: Behaviour,
    config: SessionConfig,
) -> (Session, Arc<Stats>) {
    let (client, stats) = spawn_server(fs, behaviour);
    let (reader, writer) = tokio::io::split(client);
    let session = Session::from_io(reader, writer, config)
        .await
        .expect("handshake with mock server");
    (session, stats)
}

/// Starts a session against the default tree.
pub async fn share_session() -> (Session, Arc<Stats>) {
    start_session(MockFs::share(), Behaviour::default(), SessionConfig::default()).await
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("usftp_proto=debug")
        .with_test_writer()
        .try_init();
}
