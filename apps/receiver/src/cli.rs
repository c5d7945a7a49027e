//! Receiver command-line arguments.

use std::net::IpAddr;
use std::path::PathBuf;

use clap::Parser;

/// filepush-recv - accept pushed files one connection at a time.
#[derive(Debug, Parser)]
#[command(
    name = "filepush-recv",
    version,
    about = "Accept pushed files one connection at a time"
)]
pub struct Cli {
    /// Port to listen on [default: 8877]
    #[arg(short = 'p', long = "port")]
    pub port: Option<u16>,

    /// Address to listen on [default: 0.0.0.0]
    #[arg(long = "bind")]
    pub bind: Option<IpAddr>,

    /// Directory received files are written into [default: .]
    #[arg(short = 'o', long = "output-dir", value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Bytes gathered per read before writing to disk [default: 102400]
    #[arg(long = "chunk-size", value_name = "BYTES", value_parser = parse_chunk_size)]
    pub chunk_size: Option<usize>,

    /// TOML configuration file
    #[arg(long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,
}

/// Parses a chunk size of at least one byte.
fn parse_chunk_size(s: &str) -> Result<usize, String> {
    let size: usize = s
        .parse()
        .map_err(|e| format!("invalid chunk size '{s}': {e}"))?;
    if size == 0 {
        return Err("chunk size must be at least 1 byte".into());
    }
    Ok(size)
}
