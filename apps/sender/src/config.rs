//! Sender configuration.
//!
//! Built-in defaults, optionally overlaid by a TOML file passed with
//! `--config`, then by explicit command-line flags.

use std::path::Path;

use anyhow::Context;
use filepush_data_channel::{DEFAULT_CHUNK_SIZE, DEFAULT_PORT};
use serde::{Deserialize, Serialize};

use crate::cli::Cli;

/// Sender configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Receiver address.
    #[serde(default = "default_server")]
    pub server: String,

    /// Receiver port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Block size used when reading the source file.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

fn default_server() -> String {
    "127.0.0.1".into()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: default_server(),
            port: default_port(),
            chunk_size: default_chunk_size(),
        }
    }
}

impl Config {
    /// Loads `path` if given, otherwise returns the defaults.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Applies flags given on the command line.
    pub fn with_overrides(mut self, cli: &Cli) -> Self {
        if let Some(server) = &cli.server {
            self.server = server.clone();
        }
        if let Some(port) = cli.port {
            self.port = port;
        }
        if let Some(chunk_size) = cli.chunk_size {
            self.chunk_size = chunk_size;
        }
        self
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(!self.server.is_empty(), "server address must not be empty");
        anyhow::ensure!(self.chunk_size > 0, "chunk_size must be at least 1 byte");
        Ok(())
    }
}
