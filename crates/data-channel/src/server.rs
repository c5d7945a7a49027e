//! Push server (receiver side).
//!
//! Accepts connections one at a time, parses the metadata line, opens
//! the destination file, acknowledges, and writes everything the sender
//! streams until it closes its write side.

use std::net::SocketAddr;
use std::path::PathBuf;

use filepush_protocol::DEFAULT_CHUNK_SIZE;
use filepush_protocol::wire::{read_metadata, write_ready};
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{SessionFailure, TransferError};
use crate::report::{Progress, TransferReport};
use crate::session::{Role, TransferSession};
use crate::validation::validate_file_name;

/// Receiver settings.
#[derive(Debug, Clone)]
pub struct ReceiveOptions {
    /// Directory the pushed files are written into.
    pub output_dir: PathBuf,
    /// Minimum bytes gathered per read before writing to disk,
    /// unless the sender closes first (clamped to at least 1).
    pub chunk_size: usize,
}

impl Default for ReceiveOptions {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

/// Outcome of one accepted session, as published by [`TcpPushServer::serve`].
pub type SessionResult = Result<TransferReport, SessionFailure>;

/// TCP push server.
pub struct TcpPushServer {
    options: ReceiveOptions,
    cancel: CancellationToken,
}

impl TcpPushServer {
    pub fn new(options: ReceiveOptions, cancel: CancellationToken) -> Self {
        Self { options, cancel }
    }

    /// Binds the listener.
    pub async fn listen(&self, addr: SocketAddr) -> Result<TcpListener, TransferError> {
        let listener = TcpListener::bind(addr).await?;
        let local = listener.local_addr()?;
        info!(%local, output_dir = %self.options.output_dir.display(), "push listener bound");
        Ok(listener)
    }

    /// Accepts a single connection and receives one file over it.
    pub async fn accept_and_receive(
        &self,
        listener: &TcpListener,
        progress_tx: mpsc::Sender<Progress>,
    ) -> SessionResult {
        let (stream, addr) = listener
            .accept()
            .await
            .map_err(|e| SessionFailure::before_session(Role::Receiver, e.into()))?;
        info!(%addr, "push connection accepted");
        receive_file(stream, &self.options, progress_tx).await
    }

    /// Serves sessions sequentially until cancelled.
    ///
    /// Each session runs to completion or failure before the next
    /// connection is accepted. A failed session is logged and published
    /// on `report_tx`; it never stops the loop. Cancellation is only
    /// observed between sessions.
    pub async fn serve(
        &self,
        listener: TcpListener,
        report_tx: mpsc::Sender<SessionResult>,
        progress_tx: mpsc::Sender<Progress>,
    ) -> Result<(), TransferError> {
        loop {
            debug!("waiting for push connection");
            let accepted = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    info!("push server stopping");
                    return Ok(());
                }
                result = listener.accept() => result,
            };

            let (stream, addr) = match accepted {
                Ok(pair) => pair,
                Err(e) => {
                    warn!("accept failed: {e}");
                    continue;
                }
            };
            info!(%addr, "push connection accepted");

            let result = receive_file(stream, &self.options, progress_tx.clone()).await;
            if let Err(failure) = &result {
                error!(
                    %addr,
                    kind = failure.kind(),
                    transferred = failure.transferred,
                    "push session failed: {failure}"
                );
            }

            // Nobody listening for reports is fine.
            let _ = report_tx.send(result).await;
        }
    }
}

/// Receives one file over an established connection.
///
/// The destination file is created only after the metadata line
/// parses and the name validates, so a rejected session leaves nothing
/// on disk. A transport failure while streaming leaves the partial file,
/// flushed up to the last byte read.
pub async fn receive_file<S>(
    stream: S,
    options: &ReceiveOptions,
    progress_tx: mpsc::Sender<Progress>,
) -> SessionResult
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut session = TransferSession::new(Role::Receiver);
    let mut conn = BufReader::new(stream);

    match run_session(&mut conn, options, &progress_tx, &mut session).await {
        Ok(()) => {
            let report = session.complete().map_err(|e| session.fail(e))?;
            if report.is_match() {
                info!(%report, "file received");
            } else {
                warn!(%report, "file received with byte-count mismatch");
            }
            Ok(report)
        }
        Err(e) => Err(session.fail(e)),
    }
}

async fn run_session<S>(
    conn: &mut BufReader<S>,
    options: &ReceiveOptions,
    progress_tx: &mpsc::Sender<Progress>,
    session: &mut TransferSession,
) -> Result<(), TransferError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let meta = read_metadata(conn).await?;
    debug!(name = %meta.name, size = meta.size, "metadata received");
    validate_file_name(&meta.name)?;

    let dest = options.output_dir.join(&meta.name);
    let total = meta.size;
    session.metadata_exchanged(meta)?;

    let mut file = File::create(&dest)
        .await
        .map_err(|e| TransferError::file_access(&dest, e))?;

    write_ready(conn).await?;
    debug!(dest = %dest.display(), "receiver ready");
    session.ready()?;

    session.begin_streaming()?;
    let mut buf = vec![0u8; options.chunk_size.max(1)];

    loop {
        let (n, end) = read_at_least(conn, &mut buf).await;
        if n > 0 {
            file.write_all(&buf[..n])
                .await
                .map_err(|e| TransferError::file_access(&dest, e))?;
            session.add_chunk(n);

            // Report progress (non-blocking).
            let _ = progress_tx.try_send(Progress {
                transferred: session.transferred(),
                total,
            });
        }
        match end {
            ChunkEnd::Full => {}
            ChunkEnd::Eof => {
                debug!("end of stream");
                break;
            }
            ChunkEnd::Failed(e) => {
                file.flush()
                    .await
                    .map_err(|flush_err| TransferError::file_access(&dest, flush_err))?;
                return Err(TransferError::Transport(e));
            }
        }
    }

    file.flush()
        .await
        .map_err(|e| TransferError::file_access(&dest, e))?;
    drop(file);
    Ok(())
}

/// How a [`read_at_least`] call stopped.
#[derive(Debug)]
enum ChunkEnd {
    /// The buffer is full; more may follow.
    Full,
    /// The peer closed its write side.
    Eof,
    /// The transport failed after the returned byte count.
    Failed(std::io::Error),
}

/// Reads until `buf` is full, the peer closes, or the transport fails.
///
/// Always returns the bytes filled so far, so a failure mid-chunk does
/// not drop data that already arrived.
async fn read_at_least<R: AsyncRead + Unpin>(
    reader: &mut R,
    buf: &mut [u8],
) -> (usize, ChunkEnd) {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]).await {
            Ok(0) => return (filled, ChunkEnd::Eof),
            Ok(n) => filled += n,
            Err(e) => return (filled, ChunkEnd::Failed(e)),
        }
    }
    (filled, ChunkEnd::Full)
}
