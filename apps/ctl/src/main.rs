//! Command-line controller: connects to a listening renderer, says hello,
//! sends one command and waits for its ack.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use projection_protocol::constants::{DEFAULT_RENDERER_HOST, DEFAULT_RENDERER_PORT};
use projection_protocol::{LoadSceneDefinition, Message};
use projection_renderer_client::RendererClient;

#[derive(Debug, Parser)]
#[command(version, about = "Sends show commands to a renderer")]
struct Args {
    #[arg(long, default_value = DEFAULT_RENDERER_HOST)]
    host: String,

    #[arg(long, default_value_t = DEFAULT_RENDERER_PORT)]
    port: u16,

    /// Name announced in the hello.
    #[arg(long, default_value = "ctl")]
    name: String,

    /// Seconds to wait for each reply.
    #[arg(long, default_value_t = 10)]
    timeout: u64,

    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Only perform the hello exchange.
    Hello,
    LoadScene { scene_id: String },
    PlayCue { cue_id: String },
    SetFeed { surface_id: String, feed_id: String },
    /// Send a scene definition read from a JSON file `{scene, feeds}`.
    LoadDefinition { file: PathBuf },
}

impl Command {
    fn to_message(&self) -> anyhow::Result<Option<Message>> {
        Ok(Some(match self {
            Command::Hello => return Ok(None),
            Command::LoadScene { scene_id } => Message::load_scene(scene_id.as_str()),
            Command::PlayCue { cue_id } => Message::play_cue(cue_id.as_str()),
            Command::SetFeed {
                surface_id,
                feed_id,
            } => Message::set_feed_for_surface(surface_id.as_str(), feed_id.as_str()),
            Command::LoadDefinition { file } => read_definition(file)?,
        }))
    }
}

fn read_definition(path: &Path) -> anyhow::Result<Message> {
    let def = LoadSceneDefinition::from_file(path)
        .with_context(|| format!("cannot load {}", path.display()))?;
    Ok(Message::load_scene_definition(def.scene, def.feeds))
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run(args))
}

async fn run(args: Args) -> anyhow::Result<()> {
    let message = args.command.to_message()?;

    tracing::debug!(host = %args.host, port = args.port, name = %args.name, "connecting");
    let mut client = RendererClient::new(args.host, args.port)
        .with_reply_timeout(Duration::from_secs(args.timeout.max(1)));
    client.handshake(&args.name).await?;
    tracing::debug!("hello acknowledged");

    if let Some(message) = message {
        tracing::debug!(
            message_type = %message.message_type(),
            command_id = %message.command_id,
            "sending command"
        );
        client.request(&message).await?;
        println!("{} {}", message.message_type(), message.command_id);
    } else {
        println!("hello acknowledged");
    }

    client.disconnect().await;
    Ok(())
}
