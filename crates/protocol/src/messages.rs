use std::path::Path;

use serde::Serialize;
use serde_json::Value;

use crate::decode::Fields;
use crate::error::{DecodeError, DefinitionError};
use crate::ids::{CueId, FeedId, SceneId, SurfaceId};
use crate::types::{Feed, Scene};
use crate::validation::{ValidationError, validate_scene_definition};

// ---------- Session payloads ----------

/// Identity announced once per connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Hello {
    pub version: String,
    pub role: String,
    /// Registry key. Decodes as empty when absent so the registry can
    /// answer with a specific error instead of a decode failure.
    pub name: String,
}

impl Hello {
    pub fn from_value(value: &Value) -> Result<Self, DecodeError> {
        let f = Fields::of(value, "payload")?;
        Ok(Self {
            version: f.string("version")?,
            role: f.string("role")?,
            name: f.string_or_empty("name")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Ack {
    pub command_id: String,
}

impl Ack {
    pub fn from_value(value: &Value) -> Result<Self, DecodeError> {
        let f = Fields::of(value, "payload")?;
        Ok(Self {
            command_id: f.string("commandId")?,
        })
    }
}

/// Negative acknowledgment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub command_id: String,
    pub message: String,
}

impl ErrorPayload {
    pub fn from_value(value: &Value) -> Result<Self, DecodeError> {
        let f = Fields::of(value, "payload")?;
        Ok(Self {
            command_id: f.string("commandId")?,
            message: f.string("message")?,
        })
    }
}

// ---------- Command payloads ----------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadScene {
    pub scene_id: SceneId,
}

impl LoadScene {
    pub fn from_value(value: &Value) -> Result<Self, DecodeError> {
        let f = Fields::of(value, "payload")?;
        Ok(Self {
            scene_id: f.string("sceneId")?.into(),
        })
    }
}

/// A full scene graph plus the feeds it references, for renderers that
/// have no access to the catalog.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadSceneDefinition {
    pub scene: Scene,
    pub feeds: Vec<Feed>,
}

impl LoadSceneDefinition {
    pub fn from_value(value: &Value) -> Result<Self, DecodeError> {
        let f = Fields::of(value, "payload")?;
        let scene = Scene::from_value(f.object("scene")?)?;
        let feeds = f
            .array("feeds")?
            .iter()
            .map(Feed::from_value)
            .collect::<Result<_, _>>()?;
        Ok(Self { scene, feeds })
    }

    /// Decodes a definition document: `{"scene": {...}, "feeds": [...]}`.
    pub fn parse(text: &str) -> Result<Self, DecodeError> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(&value)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_scene_definition(&self.scene, &self.feeds)
    }

    /// Reads, decodes and validates a definition file.
    pub fn from_file(path: &Path) -> Result<Self, DefinitionError> {
        let text = std::fs::read_to_string(path)?;
        let definition = Self::parse(&text)?;
        definition.validate()?;
        Ok(definition)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetFeedForSurface {
    pub surface_id: SurfaceId,
    pub feed_id: FeedId,
}

impl SetFeedForSurface {
    pub fn from_value(value: &Value) -> Result<Self, DecodeError> {
        let f = Fields::of(value, "payload")?;
        Ok(Self {
            surface_id: f.string("surfaceId")?.into(),
            feed_id: f.string("feedId")?.into(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayCue {
    pub cue_id: CueId,
}

impl PlayCue {
    pub fn from_value(value: &Value) -> Result<Self, DecodeError> {
        let f = Fields::of(value, "payload")?;
        Ok(Self {
            cue_id: f.string("cueId")?.into(),
        })
    }
}
