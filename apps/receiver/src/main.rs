//! filepush receiver entry point.

mod app;
mod cli;
mod config;

use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    // Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "starting filepush receiver"
    );

    let config = config::Config::load(cli.config.as_deref())?.with_overrides(&cli);
    config.validate()?;
    tracing::info!(
        bind = %config.bind,
        port = config.port,
        output_dir = %config.output_dir.display(),
        "configuration loaded"
    );

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(app::run(config))?;

    tracing::info!("receiver shut down cleanly");
    Ok(())
}
