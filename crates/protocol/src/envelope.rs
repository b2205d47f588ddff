use serde::Serialize;
use serde_json::{Value, json};

use crate::constants::{MessageType, PROTOCOL_VERSION};
use crate::decode::Fields;
use crate::error::DecodeError;
use crate::ids::{CueId, FeedId, SceneId, SurfaceId};
use crate::messages::{
    Ack, ErrorPayload, Hello, LoadScene, LoadSceneDefinition, PlayCue, SetFeedForSurface,
};
use crate::types::{Feed, Scene};

/// The one payload a message carries, tagged by its wire type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Payload {
    Hello(Hello),
    Ack(Ack),
    Error(ErrorPayload),
    LoadScene(LoadScene),
    LoadSceneDefinition(LoadSceneDefinition),
    SetFeedForSurface(SetFeedForSurface),
    PlayCue(PlayCue),
}

impl Payload {
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::Hello(_) => MessageType::Hello,
            Self::Ack(_) => MessageType::Ack,
            Self::Error(_) => MessageType::Error,
            Self::LoadScene(_) => MessageType::LoadScene,
            Self::LoadSceneDefinition(_) => MessageType::LoadSceneDefinition,
            Self::SetFeedForSurface(_) => MessageType::SetFeedForSurface,
            Self::PlayCue(_) => MessageType::PlayCue,
        }
    }

    /// Decodes the payload object for a known message type.
    pub fn decode(message_type: MessageType, value: &Value) -> Result<Self, DecodeError> {
        Ok(match message_type {
            MessageType::Hello => Self::Hello(Hello::from_value(value)?),
            MessageType::Ack => Self::Ack(Ack::from_value(value)?),
            MessageType::Error => Self::Error(ErrorPayload::from_value(value)?),
            MessageType::LoadScene => Self::LoadScene(LoadScene::from_value(value)?),
            MessageType::LoadSceneDefinition => {
                Self::LoadSceneDefinition(LoadSceneDefinition::from_value(value)?)
            }
            MessageType::SetFeedForSurface => {
                Self::SetFeedForSurface(SetFeedForSurface::from_value(value)?)
            }
            MessageType::PlayCue => Self::PlayCue(PlayCue::from_value(value)?),
        })
    }
}

/// One protocol message: a command id plus exactly one payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub command_id: String,
    pub payload: Payload,
}

/// Returns a fresh command id of the form `cmd-<uuid>`.
pub fn generate_command_id() -> String {
    format!("cmd-{}", uuid::Uuid::new_v4())
}

impl Message {
    pub fn new(command_id: impl Into<String>, payload: Payload) -> Self {
        Self {
            command_id: command_id.into(),
            payload,
        }
    }

    /// Wraps `payload` with a freshly generated command id.
    pub fn command(payload: Payload) -> Self {
        Self::new(generate_command_id(), payload)
    }

    pub fn message_type(&self) -> MessageType {
        self.payload.message_type()
    }

    // ---------- Constructors ----------

    pub fn hello(role: impl Into<String>, name: impl Into<String>) -> Self {
        Self::command(Payload::Hello(Hello {
            version: PROTOCOL_VERSION.to_string(),
            role: role.into(),
            name: name.into(),
        }))
    }

    pub fn ack(command_id: impl Into<String>) -> Self {
        let command_id = command_id.into();
        Self::new(command_id.clone(), Payload::Ack(Ack { command_id }))
    }

    pub fn error(command_id: impl Into<String>, message: impl Into<String>) -> Self {
        let command_id = command_id.into();
        Self::new(
            command_id.clone(),
            Payload::Error(ErrorPayload {
                command_id,
                message: message.into(),
            }),
        )
    }

    pub fn load_scene(scene_id: impl Into<SceneId>) -> Self {
        Self::command(Payload::LoadScene(LoadScene {
            scene_id: scene_id.into(),
        }))
    }

    pub fn load_scene_definition(scene: Scene, feeds: Vec<Feed>) -> Self {
        Self::command(Payload::LoadSceneDefinition(LoadSceneDefinition {
            scene,
            feeds,
        }))
    }

    pub fn set_feed_for_surface(
        surface_id: impl Into<SurfaceId>,
        feed_id: impl Into<FeedId>,
    ) -> Self {
        Self::command(Payload::SetFeedForSurface(SetFeedForSurface {
            surface_id: surface_id.into(),
            feed_id: feed_id.into(),
        }))
    }

    pub fn play_cue(cue_id: impl Into<CueId>) -> Self {
        Self::command(Payload::PlayCue(PlayCue {
            cue_id: cue_id.into(),
        }))
    }

    /// Acknowledges this message, echoing its command id.
    pub fn ack_for(&self) -> Self {
        Self::ack(self.command_id.clone())
    }

    /// Rejects this message, echoing its command id.
    pub fn error_for(&self, message: impl Into<String>) -> Self {
        Self::error(self.command_id.clone(), message)
    }

    /// Returns the acknowledged command id if this is an `ack` or `error`.
    pub fn replied_command_id(&self) -> Option<&str> {
        match &self.payload {
            Payload::Ack(a) => Some(&a.command_id),
            Payload::Error(e) => Some(&e.command_id),
            _ => None,
        }
    }

    // ---------- Encoding ----------

    pub fn to_value(&self) -> Value {
        json!({
            "type": self.message_type().as_str(),
            "commandId": self.command_id,
            "payload": self.payload,
        })
    }

    /// Encodes to a single compact JSON line, without the terminator.
    ///
    /// Newlines inside strings are escaped by the JSON encoder, so the
    /// result never contains a raw `\n`.
    pub fn encode(&self) -> String {
        self.to_value().to_string()
    }

    pub fn from_value(value: &Value) -> Result<Self, DecodeError> {
        let f = Fields::of(value, "message")?;
        let message_type: MessageType = f.string("type")?.parse()?;
        let command_id = f.string("commandId")?;
        let payload = Payload::decode(message_type, f.object("payload")?)?;
        Ok(Self {
            command_id,
            payload,
        })
    }

    pub fn decode(text: &str) -> Result<Self, DecodeError> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(&value)
    }

    pub fn decode_slice(bytes: &[u8]) -> Result<Self, DecodeError> {
        let value: Value = serde_json::from_slice(bytes)?;
        Self::from_value(&value)
    }
}
