//! Wire protocol shared by the registry, controllers and renderers.
//!
//! Messages travel as one compact JSON object per line:
//!
//! ```text
//! {"type":"hello","commandId":"cmd-1","payload":{"version":"0.1","role":"renderer","name":"stage-left"}}
//! {"type":"ack","commandId":"cmd-1","payload":{"commandId":"cmd-1"}}
//! ```

pub mod codec;
pub mod constants;
mod decode;
pub mod envelope;
pub mod error;
pub mod ids;
pub mod messages;
pub mod types;
pub mod validation;

// Re-export primary types for convenience.
pub use codec::{CodecError, LineCodec, encode_frame};
pub use constants::MessageType;
pub use envelope::{Message, Payload, generate_command_id};
pub use error::{DecodeError, DefinitionError, HandshakeError, TransportError};
pub use ids::{CueId, FeedId, SceneId, SurfaceId};
pub use messages::{
    Ack, ErrorPayload, Hello, LoadScene, LoadSceneDefinition, PlayCue, SetFeedForSurface,
};
pub use types::{BlendMode, Feed, FeedType, Scene, Surface, Vec2, VideoFileConfig};
pub use validation::ValidationError;
