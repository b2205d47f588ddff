//! Scene state kept by the renderer.
//!
//! Nothing is drawn; the renderer tracks which scene is live, which feed
//! each surface shows and the last cue played, and logs every change.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use projection_protocol::validation::validate_scene_definition;
use projection_protocol::{
    CueId, Feed, FeedId, FeedType, LoadScene, LoadSceneDefinition, PlayCue, Scene, SceneId,
    SetFeedForSurface,
};
use projection_renderer_link::{CommandError, CommandFuture, CommandHandler};

#[derive(Debug, Default)]
struct Inner {
    scenes: HashMap<SceneId, Scene>,
    feeds: HashMap<FeedId, Feed>,
    active: Option<SceneId>,
    last_cue: Option<CueId>,
}

/// Renderer-side [`CommandHandler`].
#[derive(Debug, Default)]
pub struct SceneState {
    inner: Mutex<Inner>,
}

impl SceneState {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The live scene, with any feed reassignments applied.
    pub fn active_scene(&self) -> Option<Scene> {
        let inner = self.lock();
        inner
            .active
            .as_ref()
            .and_then(|id| inner.scenes.get(id))
            .cloned()
    }

    pub fn last_cue(&self) -> Option<CueId> {
        self.lock().last_cue.clone()
    }

    pub fn scene_count(&self) -> usize {
        self.lock().scenes.len()
    }

    pub fn feed(&self, id: &FeedId) -> Option<Feed> {
        self.lock().feeds.get(id).cloned()
    }

    fn load_definition(&self, cmd: LoadSceneDefinition) -> Result<(), CommandError> {
        validate_scene_definition(&cmd.scene, &cmd.feeds)?;

        for feed in &cmd.feeds {
            log_feed(feed);
        }

        let mut inner = self.lock();
        inner
            .feeds
            .extend(cmd.feeds.into_iter().map(|f| (f.id.clone(), f)));
        let scene_id = cmd.scene.id.clone();
        tracing::info!(
            scene = %scene_id,
            name = %cmd.scene.name,
            surfaces = cmd.scene.surfaces.len(),
            "scene loaded"
        );
        inner.scenes.insert(scene_id.clone(), cmd.scene);
        inner.active = Some(scene_id);
        Ok(())
    }

    fn activate(&self, cmd: LoadScene) -> Result<(), CommandError> {
        let mut inner = self.lock();
        if !inner.scenes.contains_key(&cmd.scene_id) {
            return Err(CommandError::Failed(format!(
                "Unknown scene '{}'",
                cmd.scene_id
            )));
        }
        tracing::info!(scene = %cmd.scene_id, "scene activated");
        inner.active = Some(cmd.scene_id);
        Ok(())
    }

    fn set_feed(&self, cmd: SetFeedForSurface) -> Result<(), CommandError> {
        let mut inner = self.lock();
        if !inner.feeds.contains_key(&cmd.feed_id) {
            return Err(CommandError::Failed(format!("Unknown feed '{}'", cmd.feed_id)));
        }

        let Inner { scenes, active, .. } = &mut *inner;
        let scene = active
            .as_ref()
            .and_then(|id| scenes.get_mut(id))
            .ok_or_else(|| CommandError::Failed("No scene loaded".into()))?;
        let surface = scene.find_surface_mut(&cmd.surface_id).ok_or_else(|| {
            CommandError::Failed(format!("Unknown surface '{}'", cmd.surface_id))
        })?;

        tracing::info!(surface = %cmd.surface_id, feed = %cmd.feed_id, "surface feed changed");
        surface.feed_id = cmd.feed_id;
        Ok(())
    }

    fn play(&self, cmd: PlayCue) {
        tracing::info!(cue = %cmd.cue_id, "cue played");
        self.lock().last_cue = Some(cmd.cue_id);
    }
}

fn log_feed(feed: &Feed) {
    match feed.feed_type {
        FeedType::VideoFile => match feed.video_file_config() {
            Ok(Some(config)) => {
                tracing::info!(feed = %feed.id, path = %config.file_path, "video feed");
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(feed = %feed.id, "unreadable video feed config: {e}"),
        },
        other => tracing::info!(feed = %feed.id, kind = %other, "feed"),
    }
}

impl CommandHandler for SceneState {
    fn on_load_scene(&self, cmd: LoadScene) -> CommandFuture<'_> {
        Box::pin(async move { self.activate(cmd) })
    }

    fn on_load_scene_definition(&self, cmd: LoadSceneDefinition) -> CommandFuture<'_> {
        Box::pin(async move { self.load_definition(cmd) })
    }

    fn on_set_feed_for_surface(&self, cmd: SetFeedForSurface) -> CommandFuture<'_> {
        Box::pin(async move { self.set_feed(cmd) })
    }

    fn on_play_cue(&self, cmd: PlayCue) -> CommandFuture<'_> {
        Box::pin(async move {
            self.play(cmd);
            Ok(())
        })
    }
}
