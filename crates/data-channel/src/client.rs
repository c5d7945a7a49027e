//! Push client (sender side).
//!
//! Opens the source file, connects to the receiver, announces the file,
//! waits for readiness, and streams the content in fixed-size blocks.

use std::path::{Path, PathBuf};

use filepush_protocol::wire::{read_ready, write_metadata};
use filepush_protocol::{DEFAULT_CHUNK_SIZE, FileMeta};
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::{SessionFailure, TransferError};
use crate::report::{Progress, TransferReport};
use crate::session::{Role, TransferSession};

/// Sender tuning.
#[derive(Debug, Clone)]
pub struct PushOptions {
    /// Size of each block read from the source file (clamped to at least 1).
    pub chunk_size: usize,
}

impl Default for PushOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

/// An opened source file and the metadata announced for it.
#[derive(Debug)]
pub struct SourceFile {
    path: PathBuf,
    file: File,
    meta: FileMeta,
}

impl SourceFile {
    /// Opens `path` for reading and snapshots its name and size.
    ///
    /// The size is read now; later growth or truncation surfaces only
    /// as a mismatch in the final report.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, TransferError> {
        let path = path.as_ref();

        let file = File::open(path)
            .await
            .map_err(|e| TransferError::file_access(path, e))?;
        let metadata = file
            .metadata()
            .await
            .map_err(|e| TransferError::file_access(path, e))?;
        if !metadata.is_file() {
            return Err(TransferError::file_access(
                path,
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a regular file"),
            ));
        }

        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                TransferError::InvalidName(format!(
                    "no UTF-8 base name in {}",
                    path.display()
                ))
            })?
            .to_string();

        Ok(Self {
            path: path.to_path_buf(),
            file,
            meta: FileMeta::new(name, metadata.len()),
        })
    }

    pub fn meta(&self) -> &FileMeta {
        &self.meta
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// TCP push client.
pub struct TcpPushClient;

impl TcpPushClient {
    /// Opens `path`, connects to `host:port`, and pushes the file.
    ///
    /// The source is opened before connecting, so a missing file never
    /// reaches the receiver.
    pub async fn connect_and_send(
        host: &str,
        port: u16,
        path: impl AsRef<Path>,
        options: &PushOptions,
        progress_tx: mpsc::Sender<Progress>,
    ) -> Result<TransferReport, SessionFailure> {
        let source = SourceFile::open(path)
            .await
            .map_err(|e| SessionFailure::before_session(Role::Sender, e))?;
        info!(
            file = %source.path().display(),
            size = source.meta().size,
            "source file opened"
        );

        let stream = TcpStream::connect((host, port))
            .await
            .map_err(|e| SessionFailure::before_session(Role::Sender, e.into()))?;
        info!(host, port, "connected to receiver");

        send_file(stream, source, options, progress_tx).await
    }
}

/// Pushes `source` over an established connection.
///
/// The connection is consumed and closed when the session ends,
/// whether it completed or failed.
pub async fn send_file<S>(
    mut stream: S,
    source: SourceFile,
    options: &PushOptions,
    progress_tx: mpsc::Sender<Progress>,
) -> Result<TransferReport, SessionFailure>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut session = TransferSession::new(Role::Sender);

    match run_session(&mut stream, source, options, &progress_tx, &mut session).await {
        Ok(()) => {
            let report = session.complete().map_err(|e| session.fail(e))?;
            if report.is_match() {
                info!(%report, "push complete");
            } else {
                warn!(%report, "push complete with byte-count mismatch");
            }
            Ok(report)
        }
        Err(e) => Err(session.fail(e)),
    }
}

async fn run_session<S>(
    stream: &mut S,
    source: SourceFile,
    options: &PushOptions,
    progress_tx: &mpsc::Sender<Progress>,
    session: &mut TransferSession,
) -> Result<(), TransferError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let SourceFile {
        path,
        mut file,
        meta,
    } = source;

    write_metadata(stream, &meta).await?;
    debug!(name = %meta.name, size = meta.size, "metadata sent");
    let total = meta.size;
    session.metadata_exchanged(meta)?;

    read_ready(stream).await?;
    debug!("receiver ready");
    session.ready()?;

    session.begin_streaming()?;
    let mut buf = vec![0u8; options.chunk_size.max(1)];

    // Full blocks first; the block that comes up short ends the loop
    // and goes out as the final write, even when it is empty.
    let residual = loop {
        let n = read_block(&mut file, &mut buf)
            .await
            .map_err(|e| TransferError::file_access(&path, e))?;
        if n < buf.len() {
            break n;
        }
        write_chunk(stream, &buf[..n], total, progress_tx, session).await?;
    };
    write_chunk(stream, &buf[..residual], total, progress_tx, session).await?;

    stream.shutdown().await?;
    debug!(transferred = session.transferred(), "write side closed");
    Ok(())
}

/// Fills `buf` from `file`, stopping early only at end-of-file.
async fn read_block(file: &mut File, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = file.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

async fn write_chunk<S: AsyncWrite + Unpin>(
    stream: &mut S,
    chunk: &[u8],
    total: u64,
    progress_tx: &mpsc::Sender<Progress>,
    session: &mut TransferSession,
) -> Result<(), TransferError> {
    stream.write_all(chunk).await?;
    session.add_chunk(chunk.len());

    // Report progress (non-blocking).
    let _ = progress_tx.try_send(Progress {
        transferred: session.transferred(),
        total,
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::Outcome;
    use crate::server::{ReceiveOptions, TcpPushServer, receive_file};
    use crate::session::SessionState;
    use filepush_protocol::wire::READY_ACK;
    use std::net::SocketAddr;
    use tokio::io::AsyncBufReadExt;
    use tokio_util::sync::CancellationToken;

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 31 % 251) as u8).collect()
    }

    fn write_source(dir: &Path, name: &str, data: &[u8]) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, data).unwrap();
        path
    }

    /// Pushes over an in-memory stream into `out_dir` and returns both reports.
    async fn push_in_memory(
        src: &Path,
        out_dir: &Path,
        chunk_size: usize,
    ) -> (TransferReport, TransferReport) {
        let (client_end, server_end) = tokio::io::duplex(16 * 1024);
        let recv_opts = ReceiveOptions {
            output_dir: out_dir.to_path_buf(),
            chunk_size,
        };
        let send_opts = PushOptions { chunk_size };
        let (s_tx, _s_rx) = mpsc::channel(64);
        let (c_tx, _c_rx) = mpsc::channel(64);

        let source = SourceFile::open(src).await.unwrap();
        let (sent, received) = tokio::join!(
            send_file(client_end, source, &send_opts, c_tx),
            receive_file(server_end, &recv_opts, s_tx),
        );
        (sent.unwrap(), received.unwrap())
    }

    /// Integration test: client -> server over loopback TCP.
    #[tokio::test]
    async fn client_server_integration() {
        let server_dir = tempfile::tempdir().unwrap();
        let client_dir = tempfile::tempdir().unwrap();

        let data = pattern(300_000);
        let src = write_source(client_dir.path(), "game.bin", &data);

        let cancel = CancellationToken::new();
        let server = TcpPushServer::new(
            ReceiveOptions {
                output_dir: server_dir.path().to_path_buf(),
                chunk_size: DEFAULT_CHUNK_SIZE,
            },
            cancel,
        );
        let listener = server
            .listen("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let addr: SocketAddr = listener.local_addr().unwrap();

        let (s_tx, _) = mpsc::channel(64);
        let (c_tx, _) = mpsc::channel(64);

        let server_handle =
            tokio::spawn(async move { server.accept_and_receive(&listener, s_tx).await });

        let sent = TcpPushClient::connect_and_send(
            "127.0.0.1",
            addr.port(),
            &src,
            &PushOptions::default(),
            c_tx,
        )
        .await
        .unwrap();
        let received = server_handle.await.unwrap().unwrap();

        assert_eq!(sent.transferred, 300_000);
        assert_eq!(received.transferred, 300_000);
        assert!(sent.is_match());
        assert!(received.is_match());
        assert_eq!(received.meta, FileMeta::new("game.bin", 300_000));

        let on_disk = std::fs::read(server_dir.path().join("game.bin")).unwrap();
        assert_eq!(on_disk, data);
    }

    #[tokio::test]
    async fn chunk_size_does_not_change_result() {
        let client_dir = tempfile::tempdir().unwrap();
        let data = pattern(10_007);
        let src = write_source(client_dir.path(), "odd.bin", &data);

        for chunk_size in [1, 3, 1024, 10_007, DEFAULT_CHUNK_SIZE] {
            let out = tempfile::tempdir().unwrap();
            let (sent, received) = push_in_memory(&src, out.path(), chunk_size).await;

            assert_eq!(sent.transferred, 10_007, "chunk size {chunk_size}");
            assert_eq!(received.transferred, 10_007, "chunk size {chunk_size}");
            assert!(sent.is_match() && received.is_match());
            assert_eq!(std::fs::read(out.path().join("odd.bin")).unwrap(), data);
        }
    }

    #[tokio::test]
    async fn exact_multiple_ends_with_empty_write() {
        let client_dir = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let src = write_source(client_dir.path(), "even.bin", &pattern(2048));

        let (sent, _) = push_in_memory(&src, out.path(), 1024).await;
        // Two full blocks plus the empty residual write.
        assert_eq!(sent.chunks, 3);
        assert_eq!(sent.transferred, 2048);
    }

    #[tokio::test]
    async fn empty_file_transfer() {
        let client_dir = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let src = write_source(client_dir.path(), "empty.txt", b"");

        let (sent, received) = push_in_memory(&src, out.path(), 1024).await;

        assert_eq!(sent.transferred, 0);
        assert_eq!(sent.chunks, 1, "zero-length final write is still issued");
        assert!(sent.is_match());
        assert_eq!(received.transferred, 0);
        assert!(received.is_match());

        let on_disk = std::fs::read(out.path().join("empty.txt")).unwrap();
        assert!(on_disk.is_empty());
    }

    /// 250 000 bytes in 1 024-byte blocks: 244 full writes and a 144-byte residual.
    #[tokio::test]
    async fn report_scenario_wire_bytes() {
        let client_dir = tempfile::tempdir().unwrap();
        let data = pattern(250_000);
        let src = write_source(client_dir.path(), "report.txt", &data);

        let (client_end, server_end) = tokio::io::duplex(8 * 1024);
        let peer = tokio::spawn(async move {
            let mut reader = tokio::io::BufReader::new(server_end);
            let mut line = Vec::new();
            reader.read_until(b'\n', &mut line).await.unwrap();
            reader.get_mut().write_all(READY_ACK).await.unwrap();

            let mut content = Vec::new();
            reader.read_to_end(&mut content).await.unwrap();
            (line, content)
        });

        let (c_tx, mut c_rx) = mpsc::channel(1024);
        let source = SourceFile::open(&src).await.unwrap();
        let report = send_file(client_end, source, &PushOptions { chunk_size: 1024 }, c_tx)
            .await
            .unwrap();
        let (line, content) = peer.await.unwrap();

        assert_eq!(line, b"report.txt|250000\n");
        assert_eq!(content, data);
        assert_eq!(report.chunks, 245);
        assert_eq!(report.transferred, 250_000);
        assert!(report.to_string().contains("250000 == 250000 -> true"));

        let mut last = None;
        while let Ok(p) = c_rx.try_recv() {
            last = Some(p);
        }
        assert_eq!(
            last,
            Some(Progress {
                transferred: 250_000,
                total: 250_000
            })
        );
    }

    #[tokio::test]
    async fn closed_before_ack_is_handshake_error() {
        let client_dir = tempfile::tempdir().unwrap();
        let src = write_source(client_dir.path(), "a.bin", b"payload");

        let (client_end, server_end) = tokio::io::duplex(1024);
        let peer = tokio::spawn(async move {
            let mut reader = tokio::io::BufReader::new(server_end);
            let mut line = Vec::new();
            reader.read_until(b'\n', &mut line).await.unwrap();
            // Drop without acknowledging.
        });

        let (c_tx, mut c_rx) = mpsc::channel(8);
        let source = SourceFile::open(&src).await.unwrap();
        let result = send_file(client_end, source, &PushOptions::default(), c_tx).await;
        peer.await.unwrap();

        let failure = result.unwrap_err();
        assert!(matches!(failure.error, TransferError::Handshake(_)));
        assert_eq!(failure.transferred, 0);
        assert!(c_rx.try_recv().is_err(), "no content may be streamed");
    }

    #[tokio::test]
    async fn receiver_gone_after_ack_is_transport_error() {
        let client_dir = tempfile::tempdir().unwrap();
        let src = write_source(client_dir.path(), "big.bin", &pattern(1_000_000));

        let (client_end, server_end) = tokio::io::duplex(1024);
        let peer = tokio::spawn(async move {
            let mut reader = tokio::io::BufReader::new(server_end);
            let mut line = Vec::new();
            reader.read_until(b'\n', &mut line).await.unwrap();
            reader.get_mut().write_all(READY_ACK).await.unwrap();
            // Drop right after acknowledging.
        });

        let (c_tx, _c_rx) = mpsc::channel(1024);
        let source = SourceFile::open(&src).await.unwrap();
        let result = send_file(client_end, source, &PushOptions { chunk_size: 4096 }, c_tx).await;
        peer.await.unwrap();

        let failure = result.unwrap_err();
        assert!(
            matches!(failure.error, TransferError::Transport(_)),
            "{failure}"
        );
        assert_eq!(failure.state, SessionState::Streaming);
        assert_eq!(failure.declared, Some(1_000_000));
        assert!(failure.transferred < 1_000_000);
    }

    #[tokio::test]
    async fn missing_source_is_file_access_error() {
        let dir = tempfile::tempdir().unwrap();
        let (c_tx, _) = mpsc::channel(1);

        // Port 9 is never contacted: the file check comes first.
        let result = TcpPushClient::connect_and_send(
            "127.0.0.1",
            9,
            dir.path().join("nope.bin"),
            &PushOptions::default(),
            c_tx,
        )
        .await;
        let failure = result.unwrap_err();
        assert!(matches!(failure.error, TransferError::FileAccess { .. }));
        assert_eq!(failure.state, SessionState::Idle);
    }

    #[tokio::test]
    async fn directory_source_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let result = SourceFile::open(dir.path()).await;
        assert!(matches!(result, Err(TransferError::FileAccess { .. })));
    }

    #[tokio::test]
    async fn source_growth_is_reported_as_mismatch() {
        let client_dir = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let src = write_source(client_dir.path(), "growing.log", &pattern(1000));

        let source = SourceFile::open(&src).await.unwrap();
        assert_eq!(source.meta().size, 1000);

        // Append after the size snapshot.
        {
            use std::io::Write;
            let mut f = std::fs::OpenOptions::new().append(true).open(&src).unwrap();
            f.write_all(&[0xEE; 500]).unwrap();
        }

        let (client_end, server_end) = tokio::io::duplex(4096);
        let recv_opts = ReceiveOptions {
            output_dir: out.path().to_path_buf(),
            chunk_size: 256,
        };
        let (s_tx, _) = mpsc::channel(8);
        let (c_tx, _) = mpsc::channel(8);
        let (sent, received) = tokio::join!(
            send_file(client_end, source, &PushOptions { chunk_size: 256 }, c_tx),
            receive_file(server_end, &recv_opts, s_tx),
        );

        let sent = sent.unwrap();
        let received = received.unwrap();
        assert_eq!(
            sent.outcome,
            Outcome::Mismatch {
                declared: 1000,
                transferred: 1500
            }
        );
        assert_eq!(received.transferred, 1500);
        assert!(!received.is_match());
    }
}
