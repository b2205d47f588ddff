//! Direct mode: the renderer listens and a controller connects to it.
//!
//! One controller is served at a time; a second connection waits in the
//! accept backlog until the first one hangs up.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use projection_protocol::LineCodec;

use crate::LinkError;
use crate::dispatch::serve;
use crate::handler::CommandHandler;

pub struct DirectListener {
    local_addr: SocketAddr,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl DirectListener {
    /// Binds `addr` and starts accepting controllers. Port 0 picks a free port.
    pub async fn bind<H: CommandHandler>(
        addr: SocketAddr,
        handler: Arc<H>,
    ) -> Result<Self, LinkError> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        info!(%local_addr, "renderer listening for controllers");

        let cancel = CancellationToken::new();
        let task = tokio::spawn(accept_loop(listener, handler, cancel.clone()));

        Ok(Self {
            local_addr,
            cancel,
            task: Some(task),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    /// Stops accepting and closes the current controller connection, if any.
    pub async fn stop(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
            info!(local_addr = %self.local_addr, "renderer listener stopped");
        }
    }
}

impl Drop for DirectListener {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn accept_loop<H: CommandHandler>(
    listener: TcpListener,
    handler: Arc<H>,
    cancel: CancellationToken,
) {
    loop {
        let accepted = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            accepted = listener.accept() => accepted,
        };

        let (stream, peer_addr) = match accepted {
            Ok(pair) => pair,
            Err(e) => {
                warn!("accept failed: {e}");
                continue;
            }
        };

        let _ = stream.set_nodelay(true);
        info!(%peer_addr, "controller connected");
        let (read_half, write_half) = stream.into_split();
        serve(
            FramedRead::new(read_half, LineCodec::new()),
            FramedWrite::new(write_half, LineCodec::new()),
            handler.as_ref(),
            &cancel,
        )
        .await;
        debug!(%peer_addr, "controller disconnected");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{CommandError, CommandFuture};
    use projection_protocol::{LoadScene, Message, Payload};
    use projection_renderer_client::{ClientError, RendererClient};
    use std::time::Duration;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpStream;

    struct OneScene;

    impl CommandHandler for OneScene {
        fn on_load_scene(&self, cmd: LoadScene) -> CommandFuture<'_> {
            Box::pin(async move {
                if cmd.scene_id.as_str() == "scene-1" {
                    Ok(())
                } else {
                    Err(CommandError::Failed(format!(
                        "Unknown scene '{}'",
                        cmd.scene_id
                    )))
                }
            })
        }
    }

    async fn bind() -> DirectListener {
        DirectListener::bind("127.0.0.1:0".parse().unwrap(), Arc::new(OneScene))
            .await
            .unwrap()
    }

    fn client(port: u16) -> RendererClient {
        RendererClient::new("127.0.0.1", port).with_reply_timeout(Duration::from_secs(2))
    }

    #[tokio::test]
    async fn controller_handshake_and_commands() {
        let mut listener = bind().await;
        assert_ne!(listener.port(), 0);

        let mut ctl = client(listener.port());
        ctl.handshake("ctl").await.unwrap();
        ctl.request(&Message::load_scene("scene-1")).await.unwrap();

        let err = ctl
            .request(&Message::load_scene("scene-9"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ClientError::Rejected { ref message, .. } if message == "Unknown scene 'scene-9'"
        ));

        let err = ctl
            .request(&Message::play_cue("cue-1"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ClientError::Rejected { ref message, .. }
                if message == "playCue is not supported by this renderer"
        ));

        ctl.disconnect().await;
        listener.stop().await;
        listener.stop().await;
    }

    #[tokio::test]
    async fn bad_line_gets_unknown_error() {
        let mut listener = bind().await;
        let stream = TcpStream::connect(listener.local_addr()).await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        let mut lines = BufReader::new(read_half).lines();

        write_half.write_all(b"not json\n").await.unwrap();
        let line = tokio::time::timeout(Duration::from_secs(2), lines.next_line())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        let reply = Message::decode(&line).unwrap();
        assert_eq!(reply.command_id, "unknown");
        assert!(matches!(reply.payload, Payload::Error(ref e) if e.command_id == "unknown"));

        listener.stop().await;
    }

    #[tokio::test]
    async fn next_controller_is_served_after_first_leaves() {
        let mut listener = bind().await;

        let mut first = client(listener.port());
        first.handshake("first").await.unwrap();
        first.disconnect().await;

        let mut second = client(listener.port());
        second.handshake("second").await.unwrap();
        second.request(&Message::load_scene("scene-1")).await.unwrap();

        listener.stop().await;
    }
}
