//! Per-connection session bookkeeping.
//!
//! Both roles walk the same lifecycle:
//!
//! ```text
//! Idle -> MetadataExchanged -> Ready -> Streaming -> Completed
//!   \___________\_______________\_________\_______-> Failed
//! ```
//!
//! `Completed` and `Failed` are terminal. A session is never resumed;
//! a new attempt starts a new session on a new connection.

use std::fmt;
use std::time::Instant;

use filepush_protocol::FileMeta;
use tracing::{debug, warn};

use crate::error::{SessionFailure, TransferError};
use crate::report::{Outcome, TransferReport};

/// Which end of the connection a session runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Sender,
    Receiver,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sender => f.write_str("sender"),
            Self::Receiver => f.write_str("receiver"),
        }
    }
}

/// Lifecycle state of a push session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    MetadataExchanged,
    Ready,
    Streaming,
    Completed,
    Failed,
}

impl SessionState {
    /// Returns `true` for `Completed` and `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    fn can_advance_to(self, next: Self) -> bool {
        use SessionState::*;
        match (self, next) {
            (Idle, MetadataExchanged)
            | (MetadataExchanged, Ready)
            | (Ready, Streaming)
            | (Streaming, Completed) => true,
            (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::MetadataExchanged => "metadata-exchanged",
            Self::Ready => "ready",
            Self::Streaming => "streaming",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Tracks one file push on one connection.
///
/// Owned by the task driving the connection; never shared.
#[derive(Debug)]
pub struct TransferSession {
    role: Role,
    state: SessionState,
    meta: Option<FileMeta>,
    transferred: u64,
    chunks: u64,
    started_at: Instant,
    error: Option<String>,
}

impl TransferSession {
    /// Creates an idle session.
    pub fn new(role: Role) -> Self {
        Self {
            role,
            state: SessionState::Idle,
            meta: None,
            transferred: 0,
            chunks: 0,
            started_at: Instant::now(),
            error: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Metadata sent or parsed, once past `Idle`.
    pub fn meta(&self) -> Option<&FileMeta> {
        self.meta.as_ref()
    }

    /// Bytes written (sender) or received (receiver) so far.
    pub fn transferred(&self) -> u64 {
        self.transferred
    }

    /// Chunk operations performed so far.
    pub fn chunks(&self) -> u64 {
        self.chunks
    }

    /// Error message recorded by [`fail`](Self::fail).
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    fn advance(&mut self, next: SessionState) -> Result<(), TransferError> {
        if !self.state.can_advance_to(next) {
            return Err(TransferError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        debug!(role = %self.role, from = %self.state, to = %next, "session transition");
        self.state = next;
        Ok(())
    }

    /// Records the metadata line as sent or parsed.
    pub fn metadata_exchanged(&mut self, meta: FileMeta) -> Result<(), TransferError> {
        self.advance(SessionState::MetadataExchanged)?;
        self.meta = Some(meta);
        Ok(())
    }

    /// Records a completed readiness handshake.
    pub fn ready(&mut self) -> Result<(), TransferError> {
        self.advance(SessionState::Ready)
    }

    /// Records the first chunk operation being attempted.
    pub fn begin_streaming(&mut self) -> Result<(), TransferError> {
        self.advance(SessionState::Streaming)
    }

    /// Adds one chunk of `bytes` to the running totals.
    pub fn add_chunk(&mut self, bytes: usize) {
        debug_assert_eq!(self.state, SessionState::Streaming);
        self.transferred += bytes as u64;
        self.chunks += 1;
    }

    /// Moves to `Completed` and evaluates the byte-count match.
    pub fn complete(&mut self) -> Result<TransferReport, TransferError> {
        self.advance(SessionState::Completed)?;

        // Streaming is only reachable after metadata was recorded.
        let meta = self.meta.clone().unwrap_or_else(|| FileMeta::new("", 0));
        let outcome = Outcome::evaluate(meta.size, self.transferred);

        Ok(TransferReport {
            role: self.role,
            meta,
            transferred: self.transferred,
            chunks: self.chunks,
            elapsed: self.started_at.elapsed(),
            outcome,
        })
    }

    /// Moves to `Failed`, recording the error, and returns the failure
    /// with the counts reached so far. A session that is already terminal
    /// keeps its state.
    pub fn fail(&mut self, err: TransferError) -> SessionFailure {
        let failure = SessionFailure {
            role: self.role,
            state: self.state,
            transferred: self.transferred,
            declared: self.meta.as_ref().map(|m| m.size),
            error: err,
        };
        if self.state.is_terminal() {
            return failure;
        }
        warn!(
            role = %self.role,
            state = %self.state,
            kind = failure.kind(),
            transferred = self.transferred,
            "session failed: {}",
            failure.error
        );
        self.state = SessionState::Failed;
        self.error = Some(failure.error.to_string());
        failure
    }
}
