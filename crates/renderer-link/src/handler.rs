//! Command handler trait for renderer processes.
//!
//! Implementors apply commands to their display state; the link and the
//! listener take care of framing and of answering every command with an
//! `ack` or an `error`.

use std::future::Future;
use std::pin::Pin;

use projection_protocol::{
    Hello, LoadScene, LoadSceneDefinition, MessageType, PlayCue, SetFeedForSurface,
    ValidationError,
};

/// A boxed future returned by handler methods.
pub type CommandFuture<'a> = Pin<Box<dyn Future<Output = Result<(), CommandError>> + Send + 'a>>;

/// Why a command was not applied. The display text is sent back to the
/// controller in the `error` payload.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("{0} is not supported by this renderer")]
    Unsupported(MessageType),

    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("{0}")]
    Failed(String),
}

/// Trait for applying renderer commands.
///
/// Default implementations refuse the command, so handlers only override
/// what they support.
pub trait CommandHandler: Send + Sync + 'static {
    /// Called when a controller greets a listening renderer.
    fn on_hello(&self, hello: Hello) -> CommandFuture<'_> {
        Box::pin(async move {
            tracing::debug!(peer = %hello.name, role = %hello.role, "controller hello");
            Ok(())
        })
    }

    fn on_load_scene(&self, _cmd: LoadScene) -> CommandFuture<'_> {
        Box::pin(async { Err(CommandError::Unsupported(MessageType::LoadScene)) })
    }

    fn on_load_scene_definition(&self, _cmd: LoadSceneDefinition) -> CommandFuture<'_> {
        Box::pin(async { Err(CommandError::Unsupported(MessageType::LoadSceneDefinition)) })
    }

    fn on_set_feed_for_surface(&self, _cmd: SetFeedForSurface) -> CommandFuture<'_> {
        Box::pin(async { Err(CommandError::Unsupported(MessageType::SetFeedForSurface)) })
    }

    fn on_play_cue(&self, _cmd: PlayCue) -> CommandFuture<'_> {
        Box::pin(async { Err(CommandError::Unsupported(MessageType::PlayCue)) })
    }
}
