//! Error types for push sessions.

use std::fmt;
use std::path::PathBuf;

use filepush_protocol::ProtocolError;

use crate::session::{Role, SessionState};

/// Errors that terminate a push session.
///
/// A byte-count mismatch is not an error; it is reported through
/// [`Outcome::Mismatch`](crate::Outcome::Mismatch).
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("cannot access {}: {source}", .path.display())]
    FileAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("framing error: {0}")]
    Framing(String),

    #[error("handshake error: {0}")]
    Handshake(String),

    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    #[error("invalid file name: {0}")]
    InvalidName(String),

    #[error("invalid session transition: {from} -> {to}")]
    InvalidTransition { from: SessionState, to: SessionState },
}

impl TransferError {
    pub(crate) fn file_access(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileAccess {
            path: path.into(),
            source,
        }
    }

    /// Short stable label for the error kind, used in reports and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::FileAccess { .. } => "file-access",
            Self::Framing(_) => "framing",
            Self::Handshake(_) => "handshake",
            Self::Transport(_) => "transport",
            Self::InvalidName(_) => "invalid-name",
            Self::InvalidTransition { .. } => "invalid-transition",
        }
    }
}

impl From<ProtocolError> for TransferError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::Io(e) => Self::Transport(e),
            ProtocolError::Framing(msg) => Self::Framing(msg),
            ProtocolError::Handshake(msg) => Self::Handshake(msg),
        }
    }
}

/// A session that ended in `Failed`, with its byte counts at that point.
#[derive(Debug)]
pub struct SessionFailure {
    pub role: Role,
    /// State the session was in when the error hit.
    pub state: SessionState,
    pub transferred: u64,
    /// Declared size, if the metadata line got that far.
    pub declared: Option<u64>,
    pub error: TransferError,
}

impl SessionFailure {
    /// Failure before any session bookkeeping started (file check, connect, accept).
    pub fn before_session(role: Role, error: TransferError) -> Self {
        Self {
            role,
            state: SessionState::Idle,
            transferred: 0,
            declared: None,
            error,
        }
    }

    pub fn kind(&self) -> &'static str {
        self.error.kind()
    }
}

impl fmt::Display for SessionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} failed while {} ({}): {} [{} of ",
            self.role,
            self.state,
            self.kind(),
            self.error,
            self.transferred
        )?;
        match self.declared {
            Some(declared) => write!(f, "{declared} bytes transferred]"),
            None => f.write_str("? bytes transferred]"),
        }
    }
}

impl std::error::Error for SessionFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_line_carries_byte_counts() {
        let failure = SessionFailure {
            role: Role::Receiver,
            state: SessionState::Streaming,
            transferred: 10,
            declared: Some(100),
            error: TransferError::Transport(std::io::ErrorKind::ConnectionReset.into()),
        };
        let text = failure.to_string();
        assert!(text.starts_with("receiver failed while streaming (transport)"), "{text}");
        assert!(text.ends_with("[10 of 100 bytes transferred]"), "{text}");
    }

    #[test]
    fn failure_before_metadata_has_unknown_size() {
        let failure =
            SessionFailure::before_session(Role::Sender, TransferError::InvalidName("x".into()));
        assert_eq!(failure.state, SessionState::Idle);
        assert!(failure.to_string().ends_with("[0 of ? bytes transferred]"));
    }
}
