//! One registered renderer connection.
//!
//! A session owns the write half of its socket behind an async lock, so
//! handshake replies, broadcasts and point-to-point sends never interleave
//! partial frames. Its reader task consumes inbound replies until EOF,
//! error or cancellation, then reports the disconnect.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;

use projection_protocol::{HandshakeError, LineCodec, Message, Payload, TransportError};

use crate::events::RegistryEvent;
use crate::table::SessionTable;

pub(crate) type MessageReader = FramedRead<OwnedReadHalf, LineCodec>;
pub(crate) type MessageWriter = FramedWrite<OwnedWriteHalf, LineCodec>;

/// Called once by the reader task when the session ends on its own.
pub(crate) type DisconnectCallback = Box<dyn FnOnce(&RendererSession) + Send>;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// A renderer that completed the handshake.
pub(crate) struct RendererSession {
    id: u64,
    name: String,
    peer_addr: SocketAddr,
    writer: Mutex<Option<MessageWriter>>,
    write_timeout: Duration,
    alive: AtomicBool,
    cancel: CancellationToken,
    reader_task: StdMutex<Option<JoinHandle<()>>>,
}

impl RendererSession {
    pub(crate) fn new(
        name: String,
        peer_addr: SocketAddr,
        writer: MessageWriter,
        write_timeout: Duration,
        cancel: CancellationToken,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
            name,
            peer_addr,
            writer: Mutex::new(Some(writer)),
            write_timeout,
            alive: AtomicBool::new(false),
            cancel,
            reader_task: StdMutex::new(None),
        })
    }

    /// A session with no socket, for table bookkeeping tests.
    #[cfg(test)]
    pub(crate) fn detached(name: &str) -> Arc<Self> {
        Arc::new(Self {
            id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
            name: name.to_string(),
            peer_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            writer: Mutex::new(None),
            write_timeout: Duration::from_secs(1),
            alive: AtomicBool::new(false),
            cancel: CancellationToken::new(),
            reader_task: StdMutex::new(None),
        })
    }

    /// Unique per process; distinguishes reconnects under the same name.
    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub(crate) fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Inserts the session into `table` and acknowledges the hello.
    ///
    /// The writer lock is held from the uniqueness check until the ack is
    /// written, so nothing can reach the renderer ahead of its ack.
    pub(crate) async fn register(
        self: &Arc<Self>,
        table: &SessionTable,
        hello_command_id: &str,
    ) -> Result<(), HandshakeError> {
        let mut guard = self.writer.lock().await;
        let Some(writer) = guard.as_mut() else {
            return Err(TransportError::NotConnected.into());
        };

        if let Err(e) = table.insert_unique(self) {
            let reply = Message::error(hello_command_id, e.to_string());
            let _ = tokio::time::timeout(self.write_timeout, writer.send(&reply)).await;
            let _ = tokio::time::timeout(self.write_timeout, writer.close()).await;
            *guard = None;
            return Err(e);
        }

        let ack = Message::ack(hello_command_id);
        let result = tokio::time::timeout(self.write_timeout, writer.send(&ack)).await;
        match result {
            Ok(Ok(())) => {
                self.alive.store(true, Ordering::Release);
                Ok(())
            }
            Ok(Err(e)) => {
                table.remove_if_same(&self.name, self.id);
                *guard = None;
                Err(TransportError::SendFailed(e.into()).into())
            }
            Err(_) => {
                table.remove_if_same(&self.name, self.id);
                *guard = None;
                Err(TransportError::TimedOut.into())
            }
        }
    }

    /// Writes one frame.
    ///
    /// On failure the write half is dropped and the reader is cancelled;
    /// the caller is expected to remove the session.
    pub(crate) async fn send_message(&self, message: &Message) -> Result<(), TransportError> {
        let mut guard = self.writer.lock().await;
        let Some(writer) = guard.as_mut() else {
            return Err(TransportError::NotConnected);
        };

        let result = tokio::time::timeout(self.write_timeout, writer.send(message)).await;
        let err = match result {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(e)) => TransportError::SendFailed(e.into()),
            Err(_) => TransportError::TimedOut,
        };
        *guard = None;
        self.alive.store(false, Ordering::Release);
        self.cancel.cancel();
        Err(err)
    }

    /// Starts the reader task.
    pub(crate) fn spawn_reader(
        self: &Arc<Self>,
        reader: MessageReader,
        events: broadcast::Sender<RegistryEvent>,
        on_disconnect: DisconnectCallback,
    ) {
        let session = Arc::clone(self);
        let handle = tokio::spawn(session.read_loop(reader, events, on_disconnect));
        *self
            .reader_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(handle);
    }

    async fn read_loop(
        self: Arc<Self>,
        mut reader: MessageReader,
        events: broadcast::Sender<RegistryEvent>,
        on_disconnect: DisconnectCallback,
    ) {
        loop {
            let frame = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                frame = reader.next() => frame,
            };

            match frame {
                Some(Ok(Ok(msg))) => self.handle_inbound(msg, &events),
                Some(Ok(Err(e))) => {
                    tracing::warn!(renderer = %self.name, "discarding undecodable line: {e}");
                }
                Some(Err(e)) => {
                    tracing::warn!(renderer = %self.name, "read error: {e}");
                    break;
                }
                None => break,
            }
        }

        self.alive.store(false, Ordering::Release);
        // This task is the one `stop()` would join, so it only releases its
        // own handle here.
        self.release_reader();
        on_disconnect(&*self);
    }

    fn handle_inbound(&self, msg: Message, events: &broadcast::Sender<RegistryEvent>) {
        match msg.payload {
            Payload::Ack(ack) => {
                tracing::debug!(renderer = %self.name, command_id = %ack.command_id, "renderer ack");
                let _ = events.send(RegistryEvent::Acknowledged {
                    name: self.name.clone(),
                    command_id: ack.command_id,
                });
            }
            Payload::Error(err) => {
                tracing::debug!(
                    renderer = %self.name,
                    command_id = %err.command_id,
                    "renderer error: {}",
                    err.message
                );
                let _ = events.send(RegistryEvent::CommandFailed {
                    name: self.name.clone(),
                    command_id: err.command_id,
                    message: err.message,
                });
            }
            other => {
                tracing::debug!(
                    renderer = %self.name,
                    message_type = %other.message_type(),
                    "ignoring unexpected message from renderer"
                );
            }
        }
    }

    fn release_reader(&self) {
        drop(
            self.reader_task
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take(),
        );
    }

    /// Closes the socket and waits for the reader task to finish.
    ///
    /// Idempotent. Must not be awaited from the session's own reader task,
    /// which never calls it.
    pub(crate) async fn stop(&self) {
        self.alive.store(false, Ordering::Release);
        self.cancel.cancel();

        if let Some(mut writer) = self.writer.lock().await.take() {
            let _ = tokio::time::timeout(self.write_timeout, writer.close()).await;
        }

        let handle = self
            .reader_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

impl std::fmt::Debug for RendererSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RendererSession")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("peer_addr", &self.peer_addr)
            .field("alive", &self.is_alive())
            .finish()
    }
}
