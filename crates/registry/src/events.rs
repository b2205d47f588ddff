use std::net::SocketAddr;

/// Something that happened to a renderer session.
///
/// Published on the channel returned by
/// [`RendererRegistry::subscribe`](crate::RendererRegistry::subscribe).
/// Delivery is best effort: a lagging subscriber loses the oldest events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    /// A renderer completed the handshake.
    Registered { name: String, peer_addr: SocketAddr },

    /// A connection was refused during the handshake.
    Rejected { peer_addr: SocketAddr, reason: String },

    /// A renderer acknowledged a command.
    Acknowledged { name: String, command_id: String },

    /// A renderer refused or failed a command.
    CommandFailed {
        name: String,
        command_id: String,
        message: String,
    },

    /// A registered renderer went away.
    Disconnected { name: String },
}
