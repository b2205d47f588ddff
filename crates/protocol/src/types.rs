use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use serde_json::Value;

use crate::decode::Fields;
use crate::error::DecodeError;
use crate::ids::{FeedId, SceneId, SurfaceId};

// ---------- Enums ----------

/// Kind of media a feed produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FeedType {
    VideoFile,
    Camera,
    Generated,
}

impl FeedType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::VideoFile => "VideoFile",
            Self::Camera => "Camera",
            Self::Generated => "Generated",
        }
    }
}

impl FromStr for FeedType {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "VideoFile" => Ok(Self::VideoFile),
            "Camera" => Ok(Self::Camera),
            "Generated" => Ok(Self::Generated),
            other => Err(DecodeError::InvalidEnumValue {
                kind: "FeedType",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for FeedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a surface is composited over the surfaces beneath it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum BlendMode {
    #[default]
    Normal,
    Additive,
    Multiply,
}

impl BlendMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "Normal",
            Self::Additive => "Additive",
            Self::Multiply => "Multiply",
        }
    }
}

impl FromStr for BlendMode {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Normal" => Ok(Self::Normal),
            "Additive" => Ok(Self::Additive),
            "Multiply" => Ok(Self::Multiply),
            other => Err(DecodeError::InvalidEnumValue {
                kind: "BlendMode",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for BlendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------- Geometry ----------

/// A 2D point in normalized output coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn from_value(value: &Value) -> Result<Self, DecodeError> {
        let f = Fields::of(value, "vertex")?;
        Ok(Self {
            x: f.f32("x")?,
            y: f.f32("y")?,
        })
    }
}

// ---------- Feeds ----------

/// A media source a surface can display.
///
/// `config_json` is opaque to the protocol; its shape depends on
/// [`FeedType`]. See [`VideoFileConfig`] for the one shape the renderer
/// interprets.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Feed {
    pub id: FeedId,
    pub name: String,
    #[serde(rename = "type")]
    pub feed_type: FeedType,
    pub config_json: String,
}

/// Configuration of a [`FeedType::VideoFile`] feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoFileConfig {
    pub file_path: String,
}

impl Feed {
    pub fn new(
        id: impl Into<FeedId>,
        name: impl Into<String>,
        feed_type: FeedType,
        config_json: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            feed_type,
            config_json: config_json.into(),
        }
    }

    /// Builds a video file feed whose config is `{"filePath": path}`.
    pub fn video_file(id: impl Into<FeedId>, name: impl Into<String>, path: &str) -> Self {
        let config = serde_json::json!({ "filePath": path }).to_string();
        Self::new(id, name, FeedType::VideoFile, config)
    }

    /// Parses the video file config, or `None` for other feed types.
    pub fn video_file_config(&self) -> Result<Option<VideoFileConfig>, DecodeError> {
        if self.feed_type != FeedType::VideoFile {
            return Ok(None);
        }
        let value: Value = serde_json::from_str(&self.config_json)?;
        let f = Fields::of(&value, "configJson")?;
        Ok(Some(VideoFileConfig {
            file_path: f.string("filePath")?,
        }))
    }

    /// Decodes a feed; `configJson` may be a string or a nested object or
    /// array, which is re-serialized compactly.
    pub fn from_value(value: &Value) -> Result<Self, DecodeError> {
        let f = Fields::of(value, "feed")?;
        let id = f.string("id")?;
        let name = f.string("name")?;
        let feed_type: FeedType = f.string("type")?.parse()?;
        let config_json = match f.get("configJson")? {
            Value::String(s) => s.clone(),
            nested @ (Value::Object(_) | Value::Array(_)) => nested.to_string(),
            _ => return Err(DecodeError::wrong_type("configJson")),
        };
        Ok(Self::new(id, name, feed_type, config_json))
    }
}

// ---------- Surfaces ----------

/// A quad (or polygon) of the output mapped to one feed.
///
/// Display parameters follow a clamping policy: `opacity` and `brightness`
/// are clamped to `[0, 1]` whenever they are set, including while decoding,
/// and never produce an error. Shape invariants (vertex count, feed
/// references) are rejected separately by [`crate::validation`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Surface {
    pub id: SurfaceId,
    pub name: String,
    pub vertices: Vec<Vec2>,
    pub feed_id: FeedId,
    opacity: f32,
    brightness: f32,
    pub blend_mode: BlendMode,
    pub z_order: i32,
}

fn clamp_unit(v: f32) -> f32 {
    if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) }
}

impl Surface {
    /// Creates a fully opaque, full-brightness surface with no vertices.
    pub fn new(
        id: impl Into<SurfaceId>,
        name: impl Into<String>,
        feed_id: impl Into<FeedId>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            vertices: Vec::new(),
            feed_id: feed_id.into(),
            opacity: 1.0,
            brightness: 1.0,
            blend_mode: BlendMode::Normal,
            z_order: 0,
        }
    }

    pub fn with_vertices(mut self, vertices: Vec<Vec2>) -> Self {
        self.vertices = vertices;
        self
    }

    /// Clamped to `[0, 1]`.
    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.set_opacity(opacity);
        self
    }

    /// Clamped to `[0, 1]`.
    pub fn with_brightness(mut self, brightness: f32) -> Self {
        self.set_brightness(brightness);
        self
    }

    pub fn with_blend_mode(mut self, blend_mode: BlendMode) -> Self {
        self.blend_mode = blend_mode;
        self
    }

    pub fn with_z_order(mut self, z_order: i32) -> Self {
        self.z_order = z_order;
        self
    }

    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    pub fn brightness(&self) -> f32 {
        self.brightness
    }

    pub fn set_opacity(&mut self, opacity: f32) {
        self.opacity = clamp_unit(opacity);
    }

    pub fn set_brightness(&mut self, brightness: f32) {
        self.brightness = clamp_unit(brightness);
    }

    pub fn from_value(value: &Value) -> Result<Self, DecodeError> {
        let f = Fields::of(value, "surface")?;
        let id = f.string("id")?;
        let name = f.string("name")?;
        let vertices = f
            .array("vertices")?
            .iter()
            .map(Vec2::from_value)
            .collect::<Result<Vec<_>, _>>()?;
        let feed_id = f.string("feedId")?;
        let opacity = f.f32("opacity")?;
        let brightness = f.f32("brightness")?;
        let blend_mode: BlendMode = f.string("blendMode")?.parse()?;
        let z_order = f.i32("zOrder")?;

        Ok(Self::new(id, name, feed_id)
            .with_vertices(vertices)
            .with_opacity(opacity)
            .with_brightness(brightness)
            .with_blend_mode(blend_mode)
            .with_z_order(z_order))
    }
}

// ---------- Scenes ----------

/// An ordered set of surfaces that make up one look.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Scene {
    pub id: SceneId,
    pub name: String,
    pub description: String,
    pub surfaces: Vec<Surface>,
}

impl Scene {
    pub fn new(id: impl Into<SceneId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn find_surface(&self, id: &SurfaceId) -> Option<&Surface> {
        self.surfaces.iter().find(|s| &s.id == id)
    }

    pub fn find_surface_mut(&mut self, id: &SurfaceId) -> Option<&mut Surface> {
        self.surfaces.iter_mut().find(|s| &s.id == id)
    }

    /// Returns `true` if every surface references a feed in `feeds`.
    pub fn is_consistent(&self, feeds: &[Feed]) -> bool {
        crate::validation::validate_scene_feeds(self, feeds).is_ok()
    }

    pub fn from_value(value: &Value) -> Result<Self, DecodeError> {
        let f = Fields::of(value, "scene")?;
        Ok(Self {
            id: f.string("id")?.into(),
            name: f.string("name")?,
            description: f.string("description")?,
            surfaces: f
                .array("surfaces")?
                .iter()
                .map(Surface::from_value)
                .collect::<Result<_, _>>()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn surface_json() -> Value {
        json!({
            "id": "s1",
            "name": "Left wall",
            "vertices": [{"x": 0.0, "y": 0.0}, {"x": 1.0, "y": 0.0}, {"x": 1.0, "y": 1.0}],
            "feedId": "f1",
            "opacity": 0.5,
            "brightness": 0.75,
            "blendMode": "Additive",
            "zOrder": 2
        })
    }

    #[test]
    fn surface_from_value() {
        let s = Surface::from_value(&surface_json()).unwrap();
        assert_eq!(s.id.as_str(), "s1");
        assert_eq!(s.vertices.len(), 3);
        assert_eq!(s.opacity(), 0.5);
        assert_eq!(s.brightness(), 0.75);
        assert_eq!(s.blend_mode, BlendMode::Additive);
        assert_eq!(s.z_order, 2);
    }

    #[test]
    fn surface_serializes_camel_case() {
        let s = Surface::from_value(&surface_json()).unwrap();
        let v = serde_json::to_value(&s).unwrap();
        assert_eq!(v, surface_json());
    }

    #[test]
    fn surface_clamps_display_parameters() {
        let mut v = surface_json();
        v["opacity"] = json!(1.7);
        v["brightness"] = json!(-0.2);
        let s = Surface::from_value(&v).unwrap();
        assert_eq!(s.opacity(), 1.0);
        assert_eq!(s.brightness(), 0.0);

        let s = Surface::new("a", "a", "f").with_opacity(f32::NAN);
        assert_eq!(s.opacity(), 0.0);
    }

    #[test]
    fn surface_rejects_fractional_z_order() {
        let mut v = surface_json();
        v["zOrder"] = json!(1.5);
        let err = Surface::from_value(&v).unwrap_err();
        assert!(matches!(err, DecodeError::WrongFieldType(k) if k == "zOrder"));
    }

    #[test]
    fn surface_rejects_unknown_blend_mode() {
        let mut v = surface_json();
        v["blendMode"] = json!("Screen");
        let err = Surface::from_value(&v).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::InvalidEnumValue { kind: "BlendMode", ref value } if value == "Screen"
        ));
    }

    #[test]
    fn feed_accepts_nested_config_object() {
        let v = json!({
            "id": "f1",
            "name": "Intro",
            "type": "VideoFile",
            "configJson": {"filePath": "/media/intro.mp4"}
        });
        let feed = Feed::from_value(&v).unwrap();
        assert_eq!(feed.config_json, r#"{"filePath":"/media/intro.mp4"}"#);
        let config = feed.video_file_config().unwrap().unwrap();
        assert_eq!(config.file_path, "/media/intro.mp4");
    }

    #[test]
    fn feed_rejects_numeric_config() {
        let v = json!({"id": "f1", "name": "x", "type": "Camera", "configJson": 3});
        let err = Feed::from_value(&v).unwrap_err();
        assert!(matches!(err, DecodeError::WrongFieldType(k) if k == "configJson"));
    }

    #[test]
    fn feed_rejects_unknown_type() {
        let v = json!({"id": "f1", "name": "x", "type": "Projector", "configJson": "{}"});
        let err = Feed::from_value(&v).unwrap_err();
        assert_eq!(err.to_string(), "Invalid FeedType: Projector");
    }

    #[test]
    fn video_file_builder() {
        let feed = Feed::video_file("f2", "Loop", "/media/loop.mov");
        assert_eq!(feed.feed_type, FeedType::VideoFile);
        assert_eq!(
            feed.video_file_config().unwrap(),
            Some(VideoFileConfig {
                file_path: "/media/loop.mov".into()
            })
        );

        let camera = Feed::new("c", "cam", FeedType::Camera, "{}");
        assert_eq!(camera.video_file_config().unwrap(), None);
    }

    #[test]
    fn scene_requires_description() {
        let v = json!({"id": "scene-1", "name": "Opening", "surfaces": []});
        let err = Scene::from_value(&v).unwrap_err();
        assert!(matches!(err, DecodeError::MissingField(k) if k == "description"));
    }

    #[test]
    fn scene_find_surface() {
        let mut scene = Scene::new("scene-1", "Opening");
        scene.surfaces.push(Surface::new("s1", "Left", "f1"));
        assert!(scene.find_surface(&"s1".into()).is_some());
        assert!(scene.find_surface(&"s2".into()).is_none());
    }
}
