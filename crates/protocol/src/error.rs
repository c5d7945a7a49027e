//! Error types for the wire format.

/// Errors produced while framing or parsing the control phases.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("framing error: {0}")]
    Framing(String),

    #[error("handshake error: {0}")]
    Handshake(String),
}
