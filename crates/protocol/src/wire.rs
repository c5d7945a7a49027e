//! Stream wire format for a single-file push.
//!
//! # Wire format
//!
//! ```text
//! METADATA (Sender -> Receiver):  <name> '|' <decimal u64 size> '\n'
//! READY    (Receiver -> Sender):  [2 bytes: 0x6F 0x6B ("ok")]
//!
//! CONTENT  (Sender -> Receiver):
//!   [raw file bytes, any chunk boundaries]
//!   terminated by the sender shutting down its write side
//! ```
//!
//! The name is not escaped. A name containing `|` cannot be framed
//! unambiguously and is rejected by [`FileMeta::parse_line`].

use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt,
};

use crate::error::ProtocolError;

/// Separator between the name and size fields.
pub const FIELD_SEPARATOR: char = '|';

/// Terminator of the metadata line.
pub const LINE_TERMINATOR: u8 = b'\n';

/// Readiness acknowledgment sent by the receiver.
pub const READY_ACK: &[u8; 2] = b"ok";

/// Upper bound on the metadata line, terminator included.
pub const MAX_METADATA_LINE: usize = 8 * 1024;

/// File metadata announced before any content byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMeta {
    /// Base name of the file (no directory components).
    pub name: String,
    /// Declared size in bytes.
    pub size: u64,
}

impl FileMeta {
    pub fn new(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
        }
    }

    /// Encodes the metadata line, terminator included.
    pub fn encode(&self) -> Vec<u8> {
        format!("{}{FIELD_SEPARATOR}{}\n", self.name, self.size).into_bytes()
    }

    /// Parses one metadata line.
    ///
    /// Surrounding whitespace (including a trailing `\r\n`) is ignored.
    /// The line must hold exactly two non-empty fields and the size
    /// must be a plain decimal `u64`.
    pub fn parse_line(line: &str) -> Result<Self, ProtocolError> {
        let line = line.trim();
        let fields: Vec<&str> = line.split(FIELD_SEPARATOR).collect();

        let [name, size] = fields.as_slice() else {
            return Err(ProtocolError::Framing(format!(
                "expected 2 fields separated by '{FIELD_SEPARATOR}', got {} in {line:?}",
                fields.len()
            )));
        };

        if name.is_empty() {
            return Err(ProtocolError::Framing(format!("empty file name in {line:?}")));
        }
        if size.is_empty() {
            return Err(ProtocolError::Framing(format!("empty file size in {line:?}")));
        }
        if !size.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ProtocolError::Framing(format!(
                "file size is not a decimal number: {size:?}"
            )));
        }

        let size = size
            .parse::<u64>()
            .map_err(|e| ProtocolError::Framing(format!("file size {size:?} out of range: {e}")))?;

        Ok(Self {
            name: (*name).to_string(),
            size,
        })
    }
}

/// Writes the metadata line and flushes it.
pub async fn write_metadata<W: AsyncWrite + Unpin>(
    writer: &mut W,
    meta: &FileMeta,
) -> Result<(), ProtocolError> {
    writer.write_all(&meta.encode()).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads and parses the metadata line.
///
/// Reads at most [`MAX_METADATA_LINE`] bytes. Bytes after the
/// terminator stay buffered in `reader`.
pub async fn read_metadata<R: AsyncBufRead + Unpin>(
    reader: &mut R,
) -> Result<FileMeta, ProtocolError> {
    let mut line = Vec::new();
    let mut limited = (&mut *reader).take(MAX_METADATA_LINE as u64);
    limited.read_until(LINE_TERMINATOR, &mut line).await?;

    if line.last() != Some(&LINE_TERMINATOR) {
        if line.len() >= MAX_METADATA_LINE {
            return Err(ProtocolError::Framing(format!(
                "metadata line exceeds {MAX_METADATA_LINE} bytes"
            )));
        }
        return Err(ProtocolError::Framing(format!(
            "connection closed after {} byte(s) without a metadata line",
            line.len()
        )));
    }

    let line = String::from_utf8(line)
        .map_err(|e| ProtocolError::Framing(format!("metadata line is not UTF-8: {e}")))?;
    FileMeta::parse_line(&line)
}

/// Writes the readiness acknowledgment and flushes it.
pub async fn write_ready<W: AsyncWrite + Unpin>(writer: &mut W) -> Result<(), ProtocolError> {
    let sent = async {
        writer.write_all(READY_ACK).await?;
        writer.flush().await
    };
    sent.await.map_err(|e| {
        ProtocolError::Handshake(format!("failed sending readiness acknowledgment: {e}"))
    })
}

/// Blocks until exactly two acknowledgment bytes arrive.
///
/// Any failure before the acknowledgment completes is a handshake
/// error, including the peer closing the connection.
pub async fn read_ready<R: AsyncRead + Unpin>(reader: &mut R) -> Result<(), ProtocolError> {
    let mut ack = [0u8; READY_ACK.len()];
    match reader.read_exact(&mut ack).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(ProtocolError::Handshake(
                "connection closed before readiness acknowledgment".into(),
            ));
        }
        Err(e) => {
            return Err(ProtocolError::Handshake(format!(
                "failed reading readiness acknowledgment: {e}"
            )));
        }
    }

    if &ack != READY_ACK {
        return Err(ProtocolError::Handshake(format!(
            "unexpected acknowledgment bytes {ack:02x?}"
        )));
    }
    Ok(())
}
