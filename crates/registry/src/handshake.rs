//! First-message checks for a fresh connection.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};

use projection_protocol::constants::HANDSHAKE_COMMAND_ID;
use projection_protocol::{HandshakeError, Hello, Message, Payload, TransportError};

use crate::session::{MessageReader, MessageWriter};

/// A well-formed hello with a non-empty name.
#[derive(Debug)]
pub(crate) struct HelloRequest {
    pub command_id: String,
    pub hello: Hello,
}

/// Why the first message did not produce a [`HelloRequest`].
#[derive(Debug)]
pub(crate) struct Rejection {
    /// Command id to echo in the error reply.
    pub command_id: String,
    pub error: HandshakeError,
}

impl Rejection {
    fn new(command_id: impl Into<String>, error: HandshakeError) -> Self {
        Self {
            command_id: command_id.into(),
            error,
        }
    }

    /// The error frame to send back, if the peer can still receive one.
    pub(crate) fn reply(&self) -> Option<Message> {
        match self.error {
            HandshakeError::Transport(_) => None,
            _ => Some(Message::error(&self.command_id, self.error.to_string())),
        }
    }
}

/// Waits up to `limit` for the first message and checks it is a usable hello.
pub(crate) async fn read_hello(
    reader: &mut MessageReader,
    limit: Duration,
) -> Result<HelloRequest, Rejection> {
    let first = match tokio::time::timeout(limit, reader.next()).await {
        Err(_) => {
            return Err(Rejection::new(HANDSHAKE_COMMAND_ID, HandshakeError::TimedOut));
        }
        Ok(None) => {
            return Err(Rejection::new(
                HANDSHAKE_COMMAND_ID,
                TransportError::Closed.into(),
            ));
        }
        Ok(Some(Err(e))) => {
            return Err(Rejection::new(
                HANDSHAKE_COMMAND_ID,
                TransportError::ReceiveFailed(e.into()).into(),
            ));
        }
        Ok(Some(Ok(Err(decode)))) => {
            return Err(Rejection::new(HANDSHAKE_COMMAND_ID, decode.into()));
        }
        Ok(Some(Ok(Ok(msg)))) => msg,
    };

    let Payload::Hello(hello) = first.payload else {
        return Err(Rejection::new(first.command_id, HandshakeError::NotHello));
    };
    if hello.name.is_empty() {
        return Err(Rejection::new(first.command_id, HandshakeError::MissingName));
    }

    Ok(HelloRequest {
        command_id: first.command_id,
        hello,
    })
}

/// Sends the rejection (when possible) and closes the write half.
pub(crate) async fn reject(writer: &mut MessageWriter, rejection: &Rejection, limit: Duration) {
    if let Some(reply) = rejection.reply() {
        let _ = tokio::time::timeout(limit, writer.send(&reply)).await;
    }
    let _ = tokio::time::timeout(limit, writer.close()).await;
}
