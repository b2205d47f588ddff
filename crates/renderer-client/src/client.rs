//! Controller-side connection to a renderer (or registry) endpoint.
//!
//! Usage is strictly request/response: send one command, then read one
//! message back. There is no background task; every call runs on the
//! caller's task.

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, info};

use projection_protocol::constants::{CONNECT_TIMEOUT, ROLE_CONTROLLER};
use projection_protocol::{
    CueId, Feed, FeedId, LineCodec, Message, Payload, Scene, SceneId, SurfaceId, TransportError,
};

use crate::ClientError;

struct Connection {
    peer_addr: SocketAddr,
    reader: FramedRead<OwnedReadHalf, LineCodec>,
    writer: FramedWrite<OwnedWriteHalf, LineCodec>,
}

/// Client for one renderer endpoint.
pub struct RendererClient {
    host: String,
    port: u16,
    connect_timeout: Duration,
    reply_timeout: Option<Duration>,
    connection: Option<Connection>,
}

impl RendererClient {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            connect_timeout: CONNECT_TIMEOUT,
            reply_timeout: None,
            connection: None,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Bounds how long [`request`](Self::request) waits for the reply.
    /// Unbounded by default.
    pub fn with_reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout = Some(timeout);
        self
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.connection.as_ref().map(|c| c.peer_addr)
    }

    /// Resolves `host:port` and connects. No-op if already connected.
    pub async fn connect(&mut self) -> Result<(), ClientError> {
        if self.connection.is_some() {
            return Ok(());
        }

        let addr = format!("{}:{}", self.host, self.port);
        let stream = match tokio::time::timeout(
            self.connect_timeout,
            TcpStream::connect((self.host.as_str(), self.port)),
        )
        .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => {
                return Err(TransportError::ConnectFailed { addr, source }.into());
            }
            Err(_) => return Err(TransportError::TimedOut.into()),
        };

        let _ = stream.set_nodelay(true);
        let peer_addr = stream.peer_addr().map_err(|source| TransportError::ConnectFailed {
            addr: addr.clone(),
            source,
        })?;
        let (read_half, write_half) = stream.into_split();
        self.connection = Some(Connection {
            peer_addr,
            reader: FramedRead::new(read_half, LineCodec::new()),
            writer: FramedWrite::new(write_half, LineCodec::new()),
        });

        info!(%peer_addr, "connected to renderer endpoint");
        Ok(())
    }

    /// Writes one frame. Requires a prior [`connect`](Self::connect).
    ///
    /// A failed write drops the connection.
    pub async fn send_message(&mut self, message: &Message) -> Result<(), ClientError> {
        let conn = self.connection.as_mut().ok_or(TransportError::NotConnected)?;

        let result = conn.writer.send(message).await;
        if let Err(e) = result {
            self.connection = None;
            return Err(TransportError::SendFailed(e.into()).into());
        }
        debug!(
            message_type = %message.message_type(),
            command_id = %message.command_id,
            "sent"
        );
        Ok(())
    }

    /// Waits for the next complete message.
    ///
    /// A line that does not decode is consumed and returned as
    /// [`ClientError::Decode`]; the connection stays usable. EOF or a read
    /// error drops the connection.
    pub async fn receive_message(&mut self) -> Result<Message, ClientError> {
        let conn = self.connection.as_mut().ok_or(TransportError::NotConnected)?;

        let frame = conn.reader.next().await;
        match frame {
            Some(Ok(Ok(message))) => Ok(message),
            Some(Ok(Err(decode))) => Err(decode.into()),
            Some(Err(e)) => {
                self.connection = None;
                Err(TransportError::ReceiveFailed(e.into()).into())
            }
            None => {
                self.connection = None;
                Err(TransportError::Closed.into())
            }
        }
    }

    /// Closes the connection. No-op if not connected.
    pub async fn disconnect(&mut self) {
        if let Some(mut conn) = self.connection.take() {
            let _ = conn.writer.close().await;
            info!(peer_addr = %conn.peer_addr, "disconnected from renderer endpoint");
        }
    }

    /// Sends `message` and waits for its ack.
    ///
    /// An `error` reply becomes [`ClientError::Rejected`]; any other reply,
    /// or a reply for a different command, is [`ClientError::UnexpectedReply`].
    pub async fn request(&mut self, message: &Message) -> Result<(), ClientError> {
        self.send_message(message).await?;

        let reply = match self.reply_timeout {
            Some(limit) => tokio::time::timeout(limit, self.receive_message())
                .await
                .map_err(|_| TransportError::TimedOut)??,
            None => self.receive_message().await?,
        };

        match reply.payload {
            Payload::Ack(ack) if ack.command_id == message.command_id => Ok(()),
            Payload::Error(err) if err.command_id == message.command_id => {
                Err(ClientError::Rejected {
                    command_id: err.command_id,
                    message: err.message,
                })
            }
            other => Err(ClientError::UnexpectedReply {
                command_id: message.command_id.clone(),
                reply: other.message_type(),
            }),
        }
    }

    /// Connects if needed and announces this controller as `name`.
    pub async fn handshake(&mut self, name: &str) -> Result<(), ClientError> {
        self.connect().await?;
        self.request(&Message::hello(ROLE_CONTROLLER, name)).await
    }

    /// Sends a full scene definition. Returns the generated command id.
    pub async fn send_load_scene_definition(
        &mut self,
        scene: Scene,
        feeds: Vec<Feed>,
    ) -> Result<String, ClientError> {
        self.send_command(Message::load_scene_definition(scene, feeds)).await
    }

    pub async fn send_load_scene(
        &mut self,
        scene_id: impl Into<SceneId>,
    ) -> Result<String, ClientError> {
        self.send_command(Message::load_scene(scene_id)).await
    }

    pub async fn send_play_cue(&mut self, cue_id: impl Into<CueId>) -> Result<String, ClientError> {
        self.send_command(Message::play_cue(cue_id)).await
    }

    pub async fn send_set_feed_for_surface(
        &mut self,
        surface_id: impl Into<SurfaceId>,
        feed_id: impl Into<FeedId>,
    ) -> Result<String, ClientError> {
        self.send_command(Message::set_feed_for_surface(surface_id, feed_id))
            .await
    }

    async fn send_command(&mut self, message: Message) -> Result<String, ClientError> {
        self.send_message(&message).await?;
        Ok(message.command_id)
    }
}
