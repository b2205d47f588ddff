//! Renderer registry for the projection server.
//!
//! Renderer processes dial the registry, announce themselves with a
//! `hello`, and are tracked by name until they disconnect. The server
//! pushes scene and cue commands to them through [`RendererRegistry`].

mod events;
mod handshake;
mod registry;
mod session;
mod table;

pub use events::RegistryEvent;
pub use registry::{RegistryConfig, RendererRegistry};

use projection_protocol::TransportError;

/// Errors produced by the renderer registry.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("no renderer named '{0}' is registered")]
    UnknownRenderer(String),
}
