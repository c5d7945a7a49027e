//! Receiver configuration.
//!
//! Built-in defaults, optionally overlaid by a TOML file passed with
//! `--config`, then by explicit command-line flags.

use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};

use anyhow::Context;
use filepush_data_channel::{DEFAULT_CHUNK_SIZE, DEFAULT_PORT};
use serde::{Deserialize, Serialize};

use crate::cli::Cli;

/// Receiver configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Listening port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Listening address.
    #[serde(default = "default_bind")]
    pub bind: IpAddr,

    /// Directory received files are written into.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Bytes gathered per read before writing to disk.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_bind() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind: default_bind(),
            output_dir: default_output_dir(),
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
        if let Some(port) = cli.port {
            self.port = port;
        }
        if let Some(bind) = cli.bind {
            self.bind = bind;
        }
        if let Some(dir) = &cli.output_dir {
            self.output_dir = dir.clone();
        }
        if let Some(chunk_size) = cli.chunk_size {
            self.chunk_size = chunk_size;
        }
        self
    }

    /// Checks values before any socket is bound.
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.chunk_size > 0, "chunk_size must be at least 1 byte");
        anyhow::ensure!(
            self.output_dir.is_dir(),
            "output directory {} does not exist",
            self.output_dir.display()
        );
        Ok(())
    }
}
