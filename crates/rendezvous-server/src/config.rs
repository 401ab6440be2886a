//! Server configuration: TOML file + CLI overrides.

use rendezvous_core::{RendezvousError, RendezvousResult};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// Top-level config file structure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub server: ServerSection,
}

/// `[server]` section of the config TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Defaults to `port + 1` when unset.
    #[serde(default)]
    pub status_port: Option<u16>,
    #[serde(default = "default_outbound_queue")]
    pub outbound_queue: usize,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            status_port: None,
            outbound_queue: default_outbound_queue(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    5050
}
fn default_outbound_queue() -> usize {
    256
}

/// Resolved server configuration (CLI overrides applied).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    /// Signaling (WebSocket) port.
    pub port: u16,
    /// HTTP status port.
    pub status_port: u16,
    /// Capacity of each session's outbound queue.
    pub outbound_queue: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            status_port: default_port() + 1,
            outbound_queue: default_outbound_queue(),
        }
    }
}

impl ServerConfig {
    /// Load config from TOML file, then apply CLI overrides.
    pub fn load(
        config_path: Option<&Path>,
        cli_host: Option<&str>,
        cli_port: Option<u16>,
        cli_status_port: Option<u16>,
    ) -> RendezvousResult<Self> {
        let file_config = match config_path {
            Some(path) => {
                let expanded = expand_tilde(path);
                if expanded.exists() {
                    info!(path = %expanded.display(), "loading config file");
                    let content = std::fs::read_to_string(&expanded)?;
                    parse_config(&content)?
                } else {
                    info!(path = %expanded.display(), "config file not found, using defaults");
                    ConfigFile::default()
                }
            }
            None => ConfigFile::default(),
        };

        Self::from_file(file_config, cli_host, cli_port, cli_status_port)
    }

    fn from_file(
        file_config: ConfigFile,
        cli_host: Option<&str>,
        cli_port: Option<u16>,
        cli_status_port: Option<u16>,
    ) -> RendezvousResult<Self> {
        let server = file_config.server;
        let port = cli_port.unwrap_or(server.port);
        let status_port = match cli_status_port.or(server.status_port) {
            Some(p) => p,
            None => port.checked_add(1).ok_or_else(|| {
                RendezvousError::Config(format!(
                    "no default status port above {port}; set status_port explicitly"
                ))
            })?,
        };

        Ok(Self {
            host: cli_host.map(str::to_string).unwrap_or(server.host),
            port,
            status_port,
            outbound_queue: server.outbound_queue,
        })
    }
}

fn parse_config(content: &str) -> RendezvousResult<ConfigFile> {
    toml::from_str(content).map_err(|e| RendezvousError::Config(format!("config parse error: {e}")))
}

/// Expand `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    if let Some(rest) = s.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    path.to_path_buf()
}
