//! Routes inbound messages to a [`CommandHandler`] and writes the replies.

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;

use projection_protocol::constants::UNKNOWN_COMMAND_ID;
use projection_protocol::{LineCodec, Message, Payload};

use crate::handler::CommandHandler;

/// Applies one message and returns the reply to send.
///
/// Inbound `ack` and `error` messages are not commands and yield `None`.
pub async fn dispatch<H>(handler: &H, message: Message) -> Option<Message>
where
    H: CommandHandler + ?Sized,
{
    let command_id = message.command_id;
    let message_type = message.payload.message_type();
    let result = match message.payload {
        Payload::Ack(_) | Payload::Error(_) => {
            tracing::debug!(%command_id, %message_type, "ignoring inbound reply");
            return None;
        }
        Payload::Hello(hello) => handler.on_hello(hello).await,
        Payload::LoadScene(cmd) => handler.on_load_scene(cmd).await,
        Payload::LoadSceneDefinition(cmd) => handler.on_load_scene_definition(cmd).await,
        Payload::SetFeedForSurface(cmd) => handler.on_set_feed_for_surface(cmd).await,
        Payload::PlayCue(cmd) => handler.on_play_cue(cmd).await,
    };

    Some(match result {
        Ok(()) => {
            tracing::debug!(%command_id, %message_type, "command applied");
            Message::ack(command_id)
        }
        Err(e) => {
            tracing::warn!(%command_id, %message_type, "command failed: {e}");
            Message::error(command_id, e.to_string())
        }
    })
}

/// Reads commands until EOF, a read or write error, or cancellation,
/// answering each one in order.
pub(crate) async fn serve<R, W, H>(
    mut reader: FramedRead<R, LineCodec>,
    mut writer: FramedWrite<W, LineCodec>,
    handler: &H,
    cancel: &CancellationToken,
) where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
    H: CommandHandler + ?Sized,
{
    loop {
        let frame = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            frame = reader.next() => frame,
        };

        let reply = match frame {
            Some(Ok(Ok(message))) => dispatch(handler, message).await,
            Some(Ok(Err(e))) => {
                tracing::warn!("undecodable command: {e}");
                Some(Message::error(UNKNOWN_COMMAND_ID, e.to_string()))
            }
            Some(Err(e)) => {
                tracing::warn!("read error: {e}");
                break;
            }
            None => break,
        };

        if let Some(reply) = reply
            && let Err(e) = writer.send(&reply).await
        {
            tracing::warn!("failed to send reply: {e}");
            break;
        }
    }

    let _ = writer.close().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{CommandError, CommandFuture};
    use projection_protocol::{MessageType, PlayCue};

    struct CueOnly;

    impl CommandHandler for CueOnly {
        fn on_play_cue(&self, cmd: PlayCue) -> CommandFuture<'_> {
            Box::pin(async move {
                if cmd.cue_id.as_str() == "cue-1" {
                    Ok(())
                } else {
                    Err(CommandError::Failed(format!("Unknown cue '{}'", cmd.cue_id)))
                }
            })
        }
    }

    fn error_text(msg: &Message) -> &str {
        match &msg.payload {
            Payload::Error(e) => &e.message,
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn success_is_acked_with_same_id() {
        let cmd = Message::play_cue("cue-1");
        let reply = dispatch(&CueOnly, cmd.clone()).await.unwrap();
        assert_eq!(reply, cmd.ack_for());
    }

    #[tokio::test]
    async fn failure_becomes_error_reply() {
        let cmd = Message::play_cue("cue-9");
        let reply = dispatch(&CueOnly, cmd.clone()).await.unwrap();
        assert_eq!(reply.command_id, cmd.command_id);
        assert_eq!(error_text(&reply), "Unknown cue 'cue-9'");
    }

    #[tokio::test]
    async fn default_methods_refuse() {
        let reply = dispatch(&CueOnly, Message::load_scene("scene-1")).await.unwrap();
        assert_eq!(
            error_text(&reply),
            "loadScene is not supported by this renderer"
        );
    }

    #[tokio::test]
    async fn hello_is_acked_by_default() {
        let hello = Message::hello("controller", "ctl");
        let reply = dispatch(&CueOnly, hello.clone()).await.unwrap();
        assert_eq!(reply.message_type(), MessageType::Ack);
        assert_eq!(reply.command_id, hello.command_id);
    }

    #[tokio::test]
    async fn replies_are_not_answered() {
        assert!(dispatch(&CueOnly, Message::ack("cmd-1")).await.is_none());
        assert!(dispatch(&CueOnly, Message::error("cmd-1", "x")).await.is_none());
    }
}
