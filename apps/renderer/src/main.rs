//! Projection renderer entry point.
//!
//! Runs in one of two topologies: dial the registry (`--connect`), or
//! listen for a controller (`--listen`).

mod state;

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use projection_protocol::constants::DEFAULT_RENDERER_PORT;
use projection_renderer_link::{DirectListener, LinkConfig, RegistryLink};

use crate::state::SceneState;

#[derive(Debug, Parser)]
#[command(version, about = "Applies show commands to the local scene state")]
struct Args {
    /// Name announced to the registry (default: hostname).
    #[arg(long)]
    name: Option<String>,

    /// Registry address as host:port.
    #[arg(long, value_name = "HOST:PORT", conflicts_with = "listen")]
    connect: Option<String>,

    /// Accept a controller on this port instead of dialing a registry.
    #[arg(long, value_name = "PORT")]
    listen: Option<u16>,

    /// Dial attempts before giving up.
    #[arg(long, default_value_t = 5)]
    attempts: u32,

    #[arg(short, long)]
    verbose: bool,
}

enum Mode {
    Connect { host: String, port: u16 },
    Listen(u16),
}

impl Args {
    fn mode(&self) -> anyhow::Result<Mode> {
        if let Some(port) = self.listen {
            return Ok(Mode::Listen(port));
        }
        match self.connect.as_deref() {
            Some(addr) => {
                let (host, port) = split_host_port(addr)?;
                Ok(Mode::Connect { host, port })
            }
            None => Ok(Mode::Connect {
                host: projection_protocol::constants::DEFAULT_RENDERER_HOST.to_string(),
                port: DEFAULT_RENDERER_PORT,
            }),
        }
    }
}

fn split_host_port(addr: &str) -> anyhow::Result<(String, u16)> {
    let (host, port) = addr
        .rsplit_once(':')
        .with_context(|| format!("expected HOST:PORT, got '{addr}'"))?;
    let port = port
        .parse()
        .with_context(|| format!("invalid port in '{addr}'"))?;
    Ok((host.trim_matches(['[', ']']).to_string(), port))
}

fn default_name() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "renderer".into())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "starting projection renderer"
    );

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run(args))?;

    tracing::info!("renderer shut down cleanly");
    Ok(())
}

/// One-line account of the scene state, logged on shutdown.
fn describe(state: &SceneState) -> String {
    let loaded = state.scene_count();
    let cue = state
        .last_cue()
        .map_or_else(|| "none".to_string(), |c| c.to_string());
    let Some(scene) = state.active_scene() else {
        return format!("no active scene, {loaded} loaded, last cue {cue}");
    };

    let surfaces: Vec<String> = scene
        .surfaces
        .iter()
        .map(|s| match state.feed(&s.feed_id) {
            Some(feed) => format!("{}={} ({})", s.id, feed.id, feed.name),
            None => format!("{}={}", s.id, s.feed_id),
        })
        .collect();
    format!(
        "scene {} of {loaded} loaded, last cue {cue}, surfaces [{}]",
        scene.id,
        surfaces.join(", ")
    )
}

async fn run(args: Args) -> anyhow::Result<()> {
    let state = Arc::new(SceneState::new());

    match args.mode()? {
        Mode::Listen(port) => {
            let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
            let mut listener = DirectListener::bind(addr, Arc::clone(&state)).await?;
            tracing::info!(port = listener.port(), "waiting for controllers");
            tokio::signal::ctrl_c().await?;
            tracing::info!("SIGINT received, shutting down");
            listener.stop().await;
        }
        Mode::Connect { host, port } => {
            let config = LinkConfig {
                host,
                port,
                connect_attempts: args.attempts,
                ..LinkConfig::new(args.name.unwrap_or_else(default_name))
            };
            let mut link = RegistryLink::connect(config, Arc::clone(&state)).await?;
            tokio::select! {
                _ = link.closed() => {
                    tracing::warn!("registry closed the connection");
                }
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("SIGINT received, shutting down");
                }
            }
            link.stop().await;
        }
    }

    tracing::info!("final state: {}", describe(&state));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use projection_protocol::{Feed, LoadSceneDefinition, PlayCue, Scene, Surface, Vec2};
    use projection_renderer_link::CommandHandler;

    #[test]
    fn host_port_parsing() {
        assert_eq!(
            split_host_port("10.0.0.5:5050").unwrap(),
            ("10.0.0.5".to_string(), 5050)
        );
        assert_eq!(
            split_host_port("[::1]:6000").unwrap(),
            ("::1".to_string(), 6000)
        );
        assert!(split_host_port("registry").is_err());
        assert!(split_host_port("registry:port").is_err());
    }

    #[test]
    fn listen_wins_over_default_connect() {
        let args = Args::parse_from(["projection-renderer", "--listen", "7000"]);
        assert!(matches!(args.mode().unwrap(), Mode::Listen(7000)));

        let args = Args::parse_from(["projection-renderer"]);
        assert!(matches!(
            args.mode().unwrap(),
            Mode::Connect { ref host, port: 5050 } if host == "127.0.0.1"
        ));
    }

    #[test]
    fn connect_and_listen_conflict() {
        assert!(
            Args::try_parse_from([
                "projection-renderer",
                "--connect",
                "a:1",
                "--listen",
                "2"
            ])
            .is_err()
        );
    }

    #[tokio::test]
    async fn describe_reports_active_scene() {
        let state = SceneState::new();
        assert_eq!(describe(&state), "no active scene, 0 loaded, last cue none");

        let mut scene = Scene::new("scene-1", "Opening");
        scene.surfaces.push(Surface::new("s1", "Left", "f1").with_vertices(vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(0.0, 1.0),
        ]));
        let def = LoadSceneDefinition {
            scene,
            feeds: vec![Feed::video_file("f1", "Intro", "/media/intro.mp4")],
        };
        state.on_load_scene_definition(def).await.unwrap();
        state
            .on_play_cue(PlayCue {
                cue_id: "cue-3".into(),
            })
            .await
            .unwrap();

        assert_eq!(
            describe(&state),
            "scene scene-1 of 1 loaded, last cue cue-3, surfaces [s1=f1 (Intro)]"
        );
    }
}
