//! Server configuration.
//!
//! Stored as TOML at `$XDG_CONFIG_HOME/projection/server.toml`, falling
//! back to `~/.config/projection/server.toml`. A missing file means
//! defaults; the file is only written by `--write-config`.

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use projection_protocol::constants::{DEFAULT_RENDERER_PORT, HANDSHAKE_TIMEOUT};
use projection_registry::RegistryConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Interface the registry listens on.
    #[serde(default = "default_bind_address")]
    pub bind_address: IpAddr,

    /// Registry port (0 = ephemeral).
    #[serde(default = "default_renderer_port")]
    pub renderer_port: u16,

    #[serde(default)]
    pub verbose: bool,

    /// Seconds a new connection has to send its hello.
    #[serde(default = "default_handshake_timeout_secs")]
    pub handshake_timeout_secs: u64,
}

fn default_bind_address() -> IpAddr {
    [0, 0, 0, 0].into()
}

fn default_renderer_port() -> u16 {
    DEFAULT_RENDERER_PORT
}

fn default_handshake_timeout_secs() -> u64 {
    HANDSHAKE_TIMEOUT.as_secs()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            renderer_port: default_renderer_port(),
            verbose: false,
            handshake_timeout_secs: default_handshake_timeout_secs(),
        }
    }
}

impl Config {
    /// Loads `path`, or the default location when `None`.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = resolve_path(path);

        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("invalid config {}: {e}", path.display()))?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    pub fn registry_config(&self) -> RegistryConfig {
        RegistryConfig {
            bind_addr: self.bind_address,
            handshake_timeout: Duration::from_secs(self.handshake_timeout_secs.max(1)),
            ..RegistryConfig::default()
        }
    }
}

/// `path` if given, otherwise the default location.
pub fn resolve_path(path: Option<&Path>) -> PathBuf {
    path.map_or_else(config_path, Path::to_path_buf)
}

fn config_path() -> PathBuf {
    let base = std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            let home = std::env::var_os("HOME").unwrap_or_else(|| "/tmp".into());
            PathBuf::from(home).join(".config")
        });
    base.join("projection").join("server.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.bind_address, IpAddr::from([0, 0, 0, 0]));
        assert_eq!(config.renderer_port, 5050);
        assert!(!config.verbose);
        assert_eq!(config.handshake_timeout_secs, 10);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: Config = toml::from_str("renderer_port = 6000").unwrap();
        assert_eq!(config.renderer_port, 6000);
        assert_eq!(config.bind_address, IpAddr::from([0, 0, 0, 0]));
        assert_eq!(config.handshake_timeout_secs, 10);
    }

    #[test]
    fn save_and_load() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("server.toml");
        let config = Config {
            bind_address: [127, 0, 0, 1].into(),
            renderer_port: 7070,
            verbose: true,
            handshake_timeout_secs: 3,
        };

        config.save(&path).unwrap();
        assert_eq!(Config::load(Some(&path)).unwrap(), config);
    }

    #[test]
    fn missing_file_is_default() {
        let tmp = tempfile::tempdir().unwrap();
        let loaded = Config::load(Some(&tmp.path().join("absent.toml"))).unwrap();
        assert_eq!(loaded, Config::default());
    }

    #[test]
    fn bad_file_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("server.toml");
        std::fs::write(&path, "renderer_port = \"many\"").unwrap();
        assert!(Config::load(Some(&path)).is_err());
    }

    #[test]
    fn registry_config_uses_file_values() {
        let config = Config {
            bind_address: [127, 0, 0, 1].into(),
            handshake_timeout_secs: 0,
            ..Config::default()
        };
        let registry = config.registry_config();
        assert_eq!(registry.bind_addr, IpAddr::from([127, 0, 0, 1]));
        assert_eq!(registry.handshake_timeout, Duration::from_secs(1));
    }

    #[test]
    fn config_path_is_under_projection() {
        assert!(config_path().ends_with("projection/server.toml"));
        assert_eq!(resolve_path(None), config_path());
        assert_eq!(
            resolve_path(Some(Path::new("/etc/show.toml"))),
            PathBuf::from("/etc/show.toml")
        );
    }
}
