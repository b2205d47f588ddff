//! Outbound connection from a renderer to the registry.
//!
//! The renderer dials the registry, introduces itself with a `hello`, and
//! then answers every command the registry forwards until either side
//! hangs up.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use projection_protocol::constants::{
    CONNECT_TIMEOUT, DEFAULT_RENDERER_HOST, DEFAULT_RENDERER_PORT, HANDSHAKE_TIMEOUT,
    ROLE_RENDERER,
};
use projection_protocol::{LineCodec, Message, Payload, TransportError};

use crate::LinkError;
use crate::dispatch::serve;
use crate::handler::CommandHandler;

/// Where to find the registry and how to introduce this renderer.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    pub host: String,
    pub port: u16,
    pub name: String,
    pub connect_timeout: Duration,
    pub handshake_timeout: Duration,
    /// Dial attempts before giving up. Zero is treated as one.
    pub connect_attempts: u32,
    pub retry_delay: Duration,
}

impl LinkConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            host: DEFAULT_RENDERER_HOST.to_string(),
            port: DEFAULT_RENDERER_PORT,
            name: name.into(),
            connect_timeout: CONNECT_TIMEOUT,
            handshake_timeout: HANDSHAKE_TIMEOUT,
            connect_attempts: 1,
            retry_delay: Duration::from_secs(2),
        }
    }

    fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// A registered renderer connection.
pub struct RegistryLink {
    name: String,
    peer_addr: SocketAddr,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl RegistryLink {
    /// Dials the registry, completes the hello exchange, and starts
    /// answering commands with `handler`.
    pub async fn connect<H: CommandHandler>(
        config: LinkConfig,
        handler: Arc<H>,
    ) -> Result<Self, LinkError> {
        let stream = dial(&config).await?;
        let peer_addr = stream.peer_addr()?;
        let (read_half, write_half) = stream.into_split();
        let mut reader = FramedRead::new(read_half, LineCodec::new());
        let mut writer = FramedWrite::new(write_half, LineCodec::new());

        let hello = Message::hello(ROLE_RENDERER, config.name.as_str());
        writer
            .send(&hello)
            .await
            .map_err(|e| TransportError::SendFailed(e.into()))?;

        let reply = match tokio::time::timeout(config.handshake_timeout, reader.next()).await {
            Err(_) => return Err(TransportError::TimedOut.into()),
            Ok(None) => return Err(TransportError::Closed.into()),
            Ok(Some(Err(e))) => return Err(TransportError::ReceiveFailed(e.into()).into()),
            Ok(Some(Ok(decoded))) => decoded?,
        };

        match reply.payload {
            Payload::Ack(ack) if ack.command_id == hello.command_id => {}
            Payload::Error(err) => {
                warn!(name = %config.name, "registry rejected renderer: {}", err.message);
                return Err(LinkError::Rejected(err.message));
            }
            other => return Err(LinkError::UnexpectedReply(other.message_type())),
        }

        info!(name = %config.name, %peer_addr, "registered with renderer registry");

        let cancel = CancellationToken::new();
        let task = {
            let cancel = cancel.clone();
            let name = config.name.clone();
            tokio::spawn(async move {
                serve(reader, writer, handler.as_ref(), &cancel).await;
                info!(%name, "registry link closed");
            })
        };

        Ok(Self {
            name: config.name,
            peer_addr,
            cancel,
            task: Some(task),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Resolves once the registry closes the connection or [`stop`](Self::stop)
    /// is called.
    pub async fn closed(&mut self) {
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    /// Closes the connection. Safe to call more than once.
    pub async fn stop(&mut self) {
        self.cancel.cancel();
        self.closed().await;
    }
}

impl Drop for RegistryLink {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn dial(config: &LinkConfig) -> Result<TcpStream, LinkError> {
    let attempts = config.connect_attempts.max(1);
    let addr = config.addr();
    let mut attempt = 1;

    loop {
        let result = tokio::time::timeout(
            config.connect_timeout,
            TcpStream::connect((config.host.as_str(), config.port)),
        )
        .await;

        let error = match result {
            Ok(Ok(stream)) => {
                let _ = stream.set_nodelay(true);
                return Ok(stream);
            }
            Ok(Err(source)) => TransportError::ConnectFailed {
                addr: addr.clone(),
                source,
            },
            Err(_) => TransportError::TimedOut,
        };

        if attempt >= attempts {
            return Err(error.into());
        }
        warn!(%addr, attempt, "registry not reachable: {error}; retrying");
        attempt += 1;
        tokio::time::sleep(config.retry_delay).await;
    }
}
