//! Error taxonomy shared by every side of the renderer protocol.

use std::io;

/// A message or payload could not be decoded.
///
/// Always scoped to one line; the stream it came from stays usable.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0} must be an object")]
    NotAnObject(&'static str),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Field '{0}' has the wrong type")]
    WrongFieldType(String),

    #[error("Invalid {kind}: {value}")]
    InvalidEnumValue { kind: &'static str, value: String },

    #[error("Invalid RendererMessageType: {0}")]
    InvalidMessageType(String),
}

impl DecodeError {
    pub(crate) fn missing(field: &str) -> Self {
        Self::MissingField(field.to_string())
    }

    pub(crate) fn wrong_type(field: &str) -> Self {
        Self::WrongFieldType(field.to_string())
    }
}

/// A connection's first message did not register a renderer.
///
/// The display text is what goes back to the peer in the `error` payload.
#[derive(Debug, thiserror::Error)]
pub enum HandshakeError {
    #[error("Expected hello message")]
    NotHello,

    #[error("Renderer name must be provided")]
    MissingName,

    #[error("Renderer name already in use")]
    NameInUse,

    #[error("{0}")]
    Malformed(#[from] DecodeError),

    #[error("handshake timed out")]
    TimedOut,

    #[error("registry is shutting down")]
    ShuttingDown,

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Socket-level failures.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to connect to {addr}: {source}")]
    ConnectFailed {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("send failed: {0}")]
    SendFailed(#[source] io::Error),

    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] io::Error),

    #[error("not connected")]
    NotConnected,

    #[error("connection closed")]
    Closed,

    #[error("timed out")]
    TimedOut,
}

/// Failures loading a scene definition file.
#[derive(Debug, thiserror::Error)]
pub enum DefinitionError {
    #[error("cannot read scene definition: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Invalid(#[from] crate::validation::ValidationError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handshake_texts_are_wire_texts() {
        assert_eq!(HandshakeError::NotHello.to_string(), "Expected hello message");
        assert_eq!(
            HandshakeError::MissingName.to_string(),
            "Renderer name must be provided"
        );
        assert_eq!(
            HandshakeError::NameInUse.to_string(),
            "Renderer name already in use"
        );
    }

    #[test]
    fn malformed_handshake_shows_decode_text() {
        let err = HandshakeError::from(DecodeError::missing("commandId"));
        assert_eq!(err.to_string(), "Missing required field: commandId");
    }

    #[test]
    fn enum_value_names_kind_and_value() {
        let err = DecodeError::InvalidEnumValue {
            kind: "BlendMode",
            value: "Screen".into(),
        };
        assert_eq!(err.to_string(), "Invalid BlendMode: Screen");
    }
}
