//! Renderer registry.
//!
//! Listens on a TCP port, runs the hello handshake for every inbound
//! connection on its own task, and keeps registered renderers in a
//! name-keyed table used for broadcast and point-to-point dispatch.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;

use projection_protocol::constants::{HANDSHAKE_TIMEOUT, WRITE_TIMEOUT};
use projection_protocol::{HandshakeError, LineCodec, Message};

use crate::RegistryError;
use crate::events::RegistryEvent;
use crate::handshake;
use crate::session::RendererSession;
use crate::table::SessionTable;

/// Registry configuration.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Address to bind the listener to.
    pub bind_addr: IpAddr,
    /// Time a new connection has to send its hello.
    pub handshake_timeout: Duration,
    /// Time allowed for a single frame write.
    pub write_timeout: Duration,
    /// Buffered events per subscriber.
    pub event_capacity: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            handshake_timeout: HANDSHAKE_TIMEOUT,
            write_timeout: WRITE_TIMEOUT,
            event_capacity: 256,
        }
    }
}

struct Listening {
    local_addr: SocketAddr,
    cancel: CancellationToken,
    accept_task: JoinHandle<()>,
}

/// Accepts renderer connections and dispatches messages to them.
pub struct RendererRegistry {
    config: RegistryConfig,
    sessions: Arc<SessionTable>,
    events: broadcast::Sender<RegistryEvent>,
    listening: Mutex<Option<Listening>>,
    local_addr: StdMutex<Option<SocketAddr>>,
    running: AtomicBool,
}

impl RendererRegistry {
    pub fn new(config: RegistryConfig) -> Arc<Self> {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Arc::new(Self {
            config,
            sessions: Arc::new(SessionTable::default()),
            events,
            listening: Mutex::new(None),
            local_addr: StdMutex::new(None),
            running: AtomicBool::new(false),
        })
    }

    /// Binds `port` (0 = OS-assigned) and starts accepting renderers.
    ///
    /// Calling this while already running returns the existing address.
    pub async fn start(self: &Arc<Self>, port: u16) -> Result<SocketAddr, RegistryError> {
        let mut listening = self.listening.lock().await;
        if let Some(current) = listening.as_ref() {
            return Ok(current.local_addr);
        }

        let listener = TcpListener::bind((self.config.bind_addr, port)).await?;
        let local_addr = listener.local_addr()?;

        self.sessions.open();
        self.running.store(true, Ordering::Release);
        *self.local_addr.lock().unwrap_or_else(PoisonError::into_inner) = Some(local_addr);

        let cancel = CancellationToken::new();
        let accept_task = tokio::spawn(Arc::clone(self).accept_loop(listener, cancel.clone()));
        *listening = Some(Listening {
            local_addr,
            cancel,
            accept_task,
        });

        tracing::info!("renderer registry listening on {local_addr}");
        Ok(local_addr)
    }

    /// Stops accepting, closes every session and waits for their tasks.
    ///
    /// Idempotent; the registry can be started again afterwards.
    pub async fn stop(&self) {
        let mut listening = self.listening.lock().await;
        let Some(current) = listening.take() else {
            return;
        };

        self.running.store(false, Ordering::Release);
        current.cancel.cancel();
        let _ = current.accept_task.await;

        let sessions = self.sessions.close_and_drain();
        for session in &sessions {
            session.stop().await;
            let _ = self.events.send(RegistryEvent::Disconnected {
                name: session.name().to_string(),
            });
        }

        *self.local_addr.lock().unwrap_or_else(PoisonError::into_inner) = None;
        tracing::info!(closed = sessions.len(), "renderer registry stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Returns the bound address while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the bound port (0 if not running).
    pub fn port(&self) -> u16 {
        self.local_addr().map(|a| a.port()).unwrap_or(0)
    }

    /// Names of the registered renderers, sorted.
    pub fn renderer_names(&self) -> Vec<String> {
        self.sessions.names()
    }

    pub fn renderer_count(&self) -> usize {
        self.sessions.len()
    }

    /// Subscribes to session events, including renderer acks and errors.
    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.events.subscribe()
    }

    /// Sends `message` to every registered renderer.
    ///
    /// Returns how many writes succeeded. Sessions whose write fails are
    /// removed. Replies are not awaited; see [`subscribe`](Self::subscribe).
    pub async fn broadcast_message(&self, message: &Message) -> usize {
        let sessions = self.sessions.snapshot();
        let results = futures_util::future::join_all(
            sessions.iter().map(|session| session.send_message(message)),
        )
        .await;

        let mut delivered = 0;
        for (session, result) in sessions.iter().zip(results) {
            match result {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::warn!(renderer = %session.name(), "broadcast send failed: {e}");
                    self.drop_session(session).await;
                }
            }
        }

        tracing::debug!(
            message_type = %message.message_type(),
            command_id = %message.command_id,
            delivered,
            "broadcast"
        );
        delivered
    }

    /// Sends `message` to the renderer registered as `name`.
    pub async fn send_to(&self, name: &str, message: &Message) -> Result<(), RegistryError> {
        let session = self
            .sessions
            .get(name)
            .ok_or_else(|| RegistryError::UnknownRenderer(name.to_string()))?;

        if let Err(e) = session.send_message(message).await {
            tracing::warn!(renderer = %name, "send failed: {e}");
            self.drop_session(&session).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn drop_session(&self, session: &Arc<RendererSession>) {
        if self.sessions.remove_if_same(session.name(), session.id()) {
            let _ = self.events.send(RegistryEvent::Disconnected {
                name: session.name().to_string(),
            });
        }
        session.stop().await;
    }

    async fn accept_loop(self: Arc<Self>, listener: TcpListener, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,

                result = listener.accept() => {
                    match result {
                        Ok((stream, peer_addr)) => {
                            let registry = Arc::clone(&self);
                            let cancel = cancel.child_token();
                            tokio::spawn(async move {
                                registry.handle_connection(stream, peer_addr, cancel).await;
                            });
                        }
                        Err(e) => {
                            tracing::error!("accept error: {e}");
                        }
                    }
                }
            }
        }
        tracing::debug!("accept loop finished");
    }

    /// Runs the handshake and, on success, starts the session reader.
    async fn handle_connection(
        self: &Arc<Self>,
        stream: TcpStream,
        peer_addr: SocketAddr,
        cancel: CancellationToken,
    ) {
        let _ = stream.set_nodelay(true);
        let (read_half, write_half) = stream.into_split();
        let mut reader = FramedRead::new(read_half, LineCodec::new());
        let mut writer = FramedWrite::new(write_half, LineCodec::new());

        let outcome = tokio::select! {
            _ = cancel.cancelled() => return,
            outcome = handshake::read_hello(&mut reader, self.config.handshake_timeout) => outcome,
        };

        let request = match outcome {
            Ok(request) => request,
            Err(rejection) => {
                handshake::reject(&mut writer, &rejection, self.config.write_timeout).await;
                self.report_rejection(peer_addr, &rejection.error);
                return;
            }
        };

        let name = request.hello.name;
        // Not tied to the accept token; `stop()` drains the table and joins
        // each reader itself.
        let session = RendererSession::new(
            name.clone(),
            peer_addr,
            writer,
            self.config.write_timeout,
            CancellationToken::new(),
        );
        if let Err(e) = session.register(&self.sessions, &request.command_id).await {
            self.report_rejection(peer_addr, &e);
            return;
        }

        tracing::info!(
            renderer = %name,
            %peer_addr,
            role = %request.hello.role,
            version = %request.hello.version,
            "renderer registered"
        );
        let _ = self.events.send(RegistryEvent::Registered {
            name: name.clone(),
            peer_addr,
        });

        let sessions = Arc::clone(&self.sessions);
        let events = self.events.clone();
        session.spawn_reader(
            reader,
            self.events.clone(),
            Box::new(move |session: &RendererSession| {
                if sessions.remove_if_same(session.name(), session.id()) {
                    tracing::info!(
                        renderer = %session.name(),
                        peer_addr = %session.peer_addr(),
                        "renderer disconnected"
                    );
                    let _ = events.send(RegistryEvent::Disconnected {
                        name: session.name().to_string(),
                    });
                }
            }),
        );
    }

    fn report_rejection(&self, peer_addr: SocketAddr, error: &HandshakeError) {
        if let HandshakeError::Transport(e) = error {
            tracing::debug!(%peer_addr, "connection ended before registration: {e}");
            return;
        }
        tracing::warn!(%peer_addr, "renderer handshake rejected: {error}");
        let _ = self.events.send(RegistryEvent::Rejected {
            peer_addr,
            reason: error.to_string(),
        });
    }
}
