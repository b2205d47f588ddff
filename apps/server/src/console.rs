//! Operator console on stdin.
//!
//! One command per line:
//!
//! ```text
//! list
//! load-scene <scene-id>
//! play-cue <cue-id>
//! set-feed <surface-id> <feed-id>
//! load-definition <file.json>
//! to <renderer> <command...>
//! ```
//!
//! Commands are broadcast to every renderer unless prefixed with `to`.

use std::path::PathBuf;
use std::sync::Arc;

use projection_protocol::{LoadSceneDefinition, Message};
use projection_registry::{RegistryError, RendererRegistry};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    List,
    LoadScene(String),
    PlayCue(String),
    SetFeed { surface: String, feed: String },
    LoadDefinition(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    /// `None` broadcasts.
    pub target: Option<String>,
    pub command: Command,
}

pub fn parse_line(line: &str) -> Result<Option<Line>, String> {
    let words: Vec<&str> = line.split_whitespace().collect();
    let (target, words) = match words.as_slice() {
        [] => return Ok(None),
        ["to", name, rest @ ..] => (Some(name.to_string()), rest),
        ["to"] => return Err("usage: to <renderer> <command...>".into()),
        all => (None, all),
    };

    let command = match words {
        ["list"] if target.is_none() => Command::List,
        ["load-scene", id] => Command::LoadScene(id.to_string()),
        ["play-cue", id] => Command::PlayCue(id.to_string()),
        ["set-feed", surface, feed] => Command::SetFeed {
            surface: surface.to_string(),
            feed: feed.to_string(),
        },
        ["load-definition", path] => Command::LoadDefinition(PathBuf::from(*path)),
        [] => return Err("missing command".into()),
        [other, ..] => return Err(format!("unrecognized command '{other}'")),
    };

    Ok(Some(Line { target, command }))
}

/// Runs one parsed line against the registry.
pub async fn execute(registry: &Arc<RendererRegistry>, line: Line) -> anyhow::Result<()> {
    let message = match line.command {
        Command::List => {
            let names = registry.renderer_names();
            println!("{} renderer(s): {}", names.len(), names.join(", "));
            return Ok(());
        }
        Command::LoadScene(id) => Message::load_scene(id),
        Command::PlayCue(id) => Message::play_cue(id),
        Command::SetFeed { surface, feed } => Message::set_feed_for_surface(surface, feed),
        Command::LoadDefinition(path) => {
            let def = LoadSceneDefinition::from_file(&path)?;
            Message::load_scene_definition(def.scene, def.feeds)
        }
    };

    match line.target {
        Some(name) => match registry.send_to(&name, &message).await {
            Ok(()) => println!("sent {} to {name}", message.command_id),
            Err(RegistryError::UnknownRenderer(name)) => println!("no renderer named {name}"),
            Err(e) => return Err(e.into()),
        },
        None => {
            let delivered = registry.broadcast_message(&message).await;
            println!("sent {} to {delivered} renderer(s)", message.command_id);
        }
    }
    Ok(())
}
