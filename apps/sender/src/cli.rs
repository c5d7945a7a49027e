//! Sender command-line arguments.

use std::path::PathBuf;

use clap::Parser;

/// filepush-send - push one file to a filepush receiver.
#[derive(Debug, Parser)]
#[command(
    name = "filepush-send",
    version,
    about = "Push one file to a filepush receiver"
)]
pub struct Cli {
    /// Receiver IP address or host name [default: 127.0.0.1]
    #[arg(short = 's', long = "server")]
    pub server: Option<String>,

    /// Receiver port [default: 8877]
    #[arg(short = 'p', long = "port")]
    pub port: Option<u16>,

    /// File to send
    #[arg(short = 'f', long = "file", value_name = "FILE")]
    pub file: PathBuf,

    /// Block size used when reading the file, in bytes [default: 102400]
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
