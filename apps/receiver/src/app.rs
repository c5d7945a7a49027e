//! Receiver orchestration: listener, shutdown signal, and reporting.

use std::future::Future;
use std::net::SocketAddr;

use filepush_data_channel::{
    PROGRESS_CHANNEL_CAPACITY, Progress, ProgressSteps, ReceiveOptions, SessionResult,
    TcpPushServer,
};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::Config;

/// Serves pushes until Ctrl-C.
///
/// The signal drops a session in flight; its partial file stays on disk.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let options = ReceiveOptions {
        output_dir: config.output_dir.clone(),
        chunk_size: config.chunk_size,
    };
    let server = TcpPushServer::new(options, CancellationToken::new());
    let listener = server
        .listen(SocketAddr::new(config.bind, config.port))
        .await?;

    let (report_tx, report_rx) = mpsc::channel(PROGRESS_CHANNEL_CAPACITY);
    let (progress_tx, progress_rx) = mpsc::channel(PROGRESS_CHANNEL_CAPACITY);
    let reports = tokio::spawn(print_reports(report_rx));
    let progress = tokio::spawn(log_progress(progress_rx));

    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("SIGINT received, shutting down"),
            Err(e) => tracing::error!("cannot listen for Ctrl-C: {e}"),
        }
    };
    serve_until(&server, listener, report_tx, progress_tx, ctrl_c).await?;

    let _ = reports.await;
    let _ = progress.await;
    Ok(())
}

/// Runs the serve loop until it ends or `shutdown` resolves, whichever
/// comes first. A session that is still running is dropped.
pub async fn serve_until(
    server: &TcpPushServer,
    listener: TcpListener,
    report_tx: mpsc::Sender<SessionResult>,
    progress_tx: mpsc::Sender<Progress>,
    shutdown: impl Future<Output = ()>,
) -> anyhow::Result<()> {
    tokio::select! {
        result = server.serve(listener, report_tx, progress_tx) => result?,
        _ = shutdown => tracing::info!("push server stopped"),
    }
    Ok(())
}

/// Prints one line per finished session.
async fn print_reports(mut rx: mpsc::Receiver<SessionResult>) {
    while let Some(result) = rx.recv().await {
        match result {
            Ok(report) => println!("{report}"),
            Err(failure) => println!("session failed: {failure}"),
        }
    }
}

/// Logs every tenth of the current session at info level.
async fn log_progress(mut rx: mpsc::Receiver<Progress>) {
    let mut steps = ProgressSteps::default();
    while let Some(p) = rx.recv().await {
        if let Some(step) = steps.observe(p) {
            tracing::info!(transferred = p.transferred, total = p.total, "received {step}%");
        }
    }
}
