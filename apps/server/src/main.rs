//! Projection registry daemon entry point.

mod config;
mod console;

use std::net::IpAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

use projection_registry::{RegistryEvent, RendererRegistry};

use crate::config::Config;

#[derive(Debug, Parser)]
#[command(version, about = "Accepts renderer connections and relays show commands")]
struct Args {
    /// Config file (default: ~/.config/projection/server.toml).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Registry port, overriding the config file.
    #[arg(long)]
    port: Option<u16>,

    /// Bind address, overriding the config file.
    #[arg(long)]
    bind: Option<IpAddr>,

    #[arg(short, long)]
    verbose: bool,

    /// Write the effective configuration to the config file and exit.
    #[arg(long)]
    write_config: bool,
}

/// The config file with command-line overrides applied.
fn load_config(args: &Args) -> anyhow::Result<Config> {
    let mut config = Config::load(args.config.as_deref())?;
    if let Some(port) = args.port {
        config.renderer_port = port;
    }
    if let Some(bind) = args.bind {
        config.bind_address = bind;
    }
    config.verbose |= args.verbose;
    Ok(config)
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;

    if args.write_config {
        let path = config::resolve_path(args.config.as_deref());
        config.save(&path)?;
        println!("wrote {}", path.display());
        return Ok(());
    }

    let default_level = if config.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "starting projection server"
    );

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run(config))?;

    tracing::info!("server shut down cleanly");
    Ok(())
}

async fn run(config: Config) -> anyhow::Result<()> {
    let registry = RendererRegistry::new(config.registry_config());
    let mut events = registry.subscribe();
    let addr = registry.start(config.renderer_port).await?;
    tracing::info!(%addr, "server ready");

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("SIGINT received, shutting down");
                break;
            }
            event = events.recv() => match event {
                Ok(event) => log_event(&event),
                Err(RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "event log fell behind");
                }
                Err(RecvError::Closed) => break,
            },
            line = stdin.next_line(), if stdin_open => match line {
                Ok(Some(line)) => match console::parse_line(&line) {
                    Ok(Some(line)) => {
                        if let Err(e) = console::execute(&registry, line).await {
                            tracing::warn!("console command failed: {e}");
                        }
                    }
                    Ok(None) => {}
                    Err(usage) => println!("{usage}"),
                },
                // Detached from a terminal: keep serving without the console.
                Ok(None) | Err(_) => stdin_open = false,
            },
        }
    }

    registry.stop().await;
    Ok(())
}

fn log_event(event: &RegistryEvent) {
    match event {
        RegistryEvent::Registered { name, peer_addr } => {
            tracing::info!(renderer = %name, %peer_addr, "renderer online");
        }
        RegistryEvent::Rejected { peer_addr, reason } => {
            tracing::info!(%peer_addr, %reason, "connection rejected");
        }
        RegistryEvent::Acknowledged { name, command_id } => {
            tracing::debug!(renderer = %name, %command_id, "command applied");
        }
        RegistryEvent::CommandFailed {
            name,
            command_id,
            message,
        } => {
            tracing::warn!(renderer = %name, %command_id, "command failed: {message}");
        }
        RegistryEvent::Disconnected { name } => {
            tracing::info!(renderer = %name, "renderer offline");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_apply_on_top_of_the_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("server.toml");
        std::fs::write(&path, "renderer_port = 6000\nhandshake_timeout_secs = 4\n").unwrap();
        let path_arg = path.to_str().unwrap();

        let args = Args::parse_from([
            "projection-server",
            "--config",
            path_arg,
            "--bind",
            "127.0.0.1",
        ]);
        let config = load_config(&args).unwrap();
        assert_eq!(config.renderer_port, 6000);
        assert_eq!(config.bind_address, IpAddr::from([127, 0, 0, 1]));
        assert_eq!(config.handshake_timeout_secs, 4);
        assert!(!args.write_config);
    }

    #[test]
    fn written_config_reloads_with_overrides() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("projection").join("server.toml");
        let path_arg = path.to_str().unwrap();

        let args = Args::parse_from([
            "projection-server",
            "--config",
            path_arg,
            "--port",
            "6001",
            "--write-config",
        ]);
        assert!(args.write_config);
        let config = load_config(&args).unwrap();
        config
            .save(&config::resolve_path(args.config.as_deref()))
            .unwrap();

        let reloaded = Config::load(Some(&path)).unwrap();
        assert_eq!(reloaded.renderer_port, 6001);
        assert_eq!(reloaded, config);
    }
}
