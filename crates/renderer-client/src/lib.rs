//! Client used by controllers such as `projection-ctl` to talk to a
//! renderer endpoint one request at a time.

mod client;

pub use client::RendererClient;

use projection_protocol::{DecodeError, MessageType, TransportError};

/// Errors produced by [`RendererClient`].
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("undecodable reply: {0}")]
    Decode(#[from] DecodeError),

    #[error("renderer rejected command {command_id}: {message}")]
    Rejected { command_id: String, message: String },

    #[error("unexpected {reply} reply to command {command_id}")]
    UnexpectedReply {
        command_id: String,
        reply: MessageType,
    },
}
