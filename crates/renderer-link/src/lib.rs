//! Renderer-side networking.
//!
//! A renderer either dials the registry ([`RegistryLink`]) or accepts a
//! controller directly ([`DirectListener`]). Both answer every command
//! with an `ack` or an `error` produced by a [`CommandHandler`].

pub mod dispatch;
pub mod handler;
pub mod link;
pub mod listener;

pub use dispatch::dispatch;
pub use handler::{CommandError, CommandFuture, CommandHandler};
pub use link::{LinkConfig, RegistryLink};
pub use listener::DirectListener;

use projection_protocol::{DecodeError, MessageType, TransportError};

#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid reply: {0}")]
    Decode(#[from] DecodeError),

    #[error("registry rejected renderer: {0}")]
    Rejected(String),

    #[error("unexpected {0} reply to hello")]
    UnexpectedReply(MessageType),
}
