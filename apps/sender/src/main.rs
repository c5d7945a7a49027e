//! filepush sender entry point.

mod app;
mod cli;
mod config;

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<ExitCode> {
    let cli = cli::Cli::parse();

    // Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = config::Config::load(cli.config.as_deref())?.with_overrides(&cli);
    config.validate()?;
    tracing::info!(
        server = %config.server,
        port = config.port,
        file = %cli.file.display(),
        "starting filepush sender"
    );

    let rt = tokio::runtime::Runtime::new()?;
    let report = rt.block_on(app::run(&config, &cli.file))?;

    println!("{report}");
    if report.is_match() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(app::EXIT_MISMATCH))
    }
}
