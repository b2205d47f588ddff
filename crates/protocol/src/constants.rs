use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::DecodeError;

/// Protocol version announced in every `hello`.
pub const PROTOCOL_VERSION: &str = "0.1";

/// Role announced by renderer processes.
pub const ROLE_RENDERER: &str = "renderer";

/// Role announced by controllers dialing a renderer directly.
pub const ROLE_CONTROLLER: &str = "controller";

/// Port renderers and registries listen on unless configured otherwise.
pub const DEFAULT_RENDERER_PORT: u16 = 5050;

/// Host controllers dial unless configured otherwise.
pub const DEFAULT_RENDERER_HOST: &str = "127.0.0.1";

/// Time a fresh connection has to deliver its first message.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Time allowed to establish an outbound TCP connection.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Time allowed to write one frame.
///
/// A peer that stops reading would otherwise hold a session's send lock
/// forever, which would also block `stop()`.
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum length of a single line (16 MB).
///
/// Scene definitions with many surfaces are the largest messages; anything
/// past this without a newline is treated as a broken stream.
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Command id used in errors sent before a usable command id is known.
pub const HANDSHAKE_COMMAND_ID: &str = "handshake";

/// Command id used when replying to a line that could not be decoded.
pub const UNKNOWN_COMMAND_ID: &str = "unknown";

/// Wire discriminant of a [`Message`](crate::Message).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MessageType {
    Hello,
    Ack,
    Error,
    LoadScene,
    LoadSceneDefinition,
    SetFeedForSurface,
    PlayCue,
}

impl MessageType {
    /// Returns the exact string used in the `type` field.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hello => "hello",
            Self::Ack => "ack",
            Self::Error => "error",
            Self::LoadScene => "loadScene",
            Self::LoadSceneDefinition => "loadSceneDefinition",
            Self::SetFeedForSurface => "setFeedForSurface",
            Self::PlayCue => "playCue",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageType {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hello" => Ok(Self::Hello),
            "ack" => Ok(Self::Ack),
            "error" => Ok(Self::Error),
            "loadScene" => Ok(Self::LoadScene),
            "loadSceneDefinition" => Ok(Self::LoadSceneDefinition),
            "setFeedForSurface" => Ok(Self::SetFeedForSurface),
            "playCue" => Ok(Self::PlayCue),
            other => Err(DecodeError::InvalidMessageType(other.to_string())),
        }
    }
}
