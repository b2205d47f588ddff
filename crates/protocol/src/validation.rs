//! Structural checks on scene definitions.
//!
//! These reject shapes a renderer cannot draw. Display parameters are
//! clamped on construction instead and never fail here.

use crate::types::{Feed, Scene, Surface};

/// Minimum vertex count for a drawable surface.
pub const MIN_SURFACE_VERTICES: usize = 3;

/// Why a scene definition was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Surface id must not be empty.")]
    EmptySurfaceId,

    #[error("Surface '{surface}' must have at least {MIN_SURFACE_VERTICES} vertices.")]
    TooFewVertices { surface: String },

    #[error("Surface '{surface}' has a non-finite vertex.")]
    NonFiniteVertex { surface: String },

    #[error("Surface '{surface}' references unknown feed '{feed}'.")]
    UnknownFeed { surface: String, feed: String },

    #[error("Scene contains duplicate surface id '{surface}'.")]
    DuplicateSurface { surface: String },
}

pub fn validate_surface(surface: &Surface) -> Result<(), ValidationError> {
    if surface.id.is_empty() {
        return Err(ValidationError::EmptySurfaceId);
    }
    if surface.vertices.len() < MIN_SURFACE_VERTICES {
        return Err(ValidationError::TooFewVertices {
            surface: surface.id.value.clone(),
        });
    }
    if surface
        .vertices
        .iter()
        .any(|v| !v.x.is_finite() || !v.y.is_finite())
    {
        return Err(ValidationError::NonFiniteVertex {
            surface: surface.id.value.clone(),
        });
    }
    Ok(())
}

/// Every surface must point at a feed in `feeds`.
pub fn validate_scene_feeds(scene: &Scene, feeds: &[Feed]) -> Result<(), ValidationError> {
    for surface in &scene.surfaces {
        if !feeds.iter().any(|f| f.id == surface.feed_id) {
            return Err(ValidationError::UnknownFeed {
                surface: surface.id.value.clone(),
                feed: surface.feed_id.value.clone(),
            });
        }
    }
    Ok(())
}

/// Runs every check a renderer applies before accepting a definition.
pub fn validate_scene_definition(scene: &Scene, feeds: &[Feed]) -> Result<(), ValidationError> {
    for (i, surface) in scene.surfaces.iter().enumerate() {
        validate_surface(surface)?;
        if scene.surfaces[..i].iter().any(|s| s.id == surface.id) {
            return Err(ValidationError::DuplicateSurface {
                surface: surface.id.value.clone(),
            });
        }
    }
    validate_scene_feeds(scene, feeds)
}
