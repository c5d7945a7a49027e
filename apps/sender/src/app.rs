//! Runs one push and follows its progress.

use std::path::Path;

use filepush_data_channel::{
    PROGRESS_CHANNEL_CAPACITY, Progress, ProgressSteps, PushOptions, TcpPushClient,
    TransferReport,
};
use tokio::sync::mpsc;

use crate::config::Config;

/// Exit code when the push completed but the byte counts differ.
pub const EXIT_MISMATCH: u8 = 2;

/// Pushes `file` to the configured receiver.
pub async fn run(config: &Config, file: &Path) -> anyhow::Result<TransferReport> {
    let (progress_tx, progress_rx) = mpsc::channel(PROGRESS_CHANNEL_CAPACITY);
    let progress = tokio::spawn(log_progress(progress_rx));

    let options = PushOptions {
        chunk_size: config.chunk_size,
    };
    let result =
        TcpPushClient::connect_and_send(&config.server, config.port, file, &options, progress_tx)
            .await;

    // The sender half was consumed by the push, so the logger drains and exits.
    let _ = progress.await;
    // The failure's Display carries the byte counts reached.
    Ok(result?)
}

/// Logs every tenth of the transfer at info level.
async fn log_progress(mut rx: mpsc::Receiver<Progress>) {
    let mut steps = ProgressSteps::default();
    while let Some(p) = rx.recv().await {
        if let Some(step) = steps.observe(p) {
            tracing::info!(transferred = p.transferred, total = p.total, "sent {step}%");
        }
    }
}
