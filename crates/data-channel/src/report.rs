//! Transfer reports and progress events.

use std::fmt;
use std::time::Duration;

use filepush_protocol::FileMeta;

use crate::session::Role;

/// Result of comparing the declared size with the bytes transferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Match,
    /// Truncation, a source file that changed size, or a dropped
    /// connection. The causes are not distinguished.
    Mismatch { declared: u64, transferred: u64 },
}

impl Outcome {
    pub fn evaluate(declared: u64, transferred: u64) -> Self {
        if declared == transferred {
            Self::Match
        } else {
            Self::Mismatch {
                declared,
                transferred,
            }
        }
    }
}

/// Summary of a session that reached `Completed`.
#[derive(Debug, Clone)]
pub struct TransferReport {
    pub role: Role,
    pub meta: FileMeta,
    /// Bytes written (sender) or received (receiver).
    pub transferred: u64,
    /// Chunk operations, including a trailing zero-length write on the sender.
    pub chunks: u64,
    pub elapsed: Duration,
    pub outcome: Outcome,
}

impl TransferReport {
    pub fn is_match(&self) -> bool {
        self.outcome == Outcome::Match
    }
}

impl fmt::Display for TransferReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}: {} == {} -> {}",
            self.role,
            self.meta.name,
            self.transferred,
            self.meta.size,
            self.is_match()
        )?;
        if let Outcome::Mismatch {
            declared,
            transferred,
        } = self.outcome
        {
            let delta = i128::from(transferred) - i128::from(declared);
            write!(f, " (integrity mismatch, {delta:+} bytes)")?;
        }
        write!(
            f,
            " [{} chunk(s) in {:.2}s]",
            self.chunks,
            self.elapsed.as_secs_f64()
        )
    }
}

/// Running byte count published while streaming.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub transferred: u64,
    pub total: u64,
}

impl Progress {
    /// Whole percent of the declared size, capped at 100.
    ///
    /// An empty declared size counts as done.
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        let pct = self.transferred.saturating_mul(100) / self.total;
        pct.min(100) as u8
    }
}

/// Percent granularity of [`ProgressSteps`].
pub const PROGRESS_STEP: u8 = 10;

/// Thins a progress stream down to every [`PROGRESS_STEP`] percent.
///
/// A different total, or a byte count that goes backwards, is taken as
/// the start of a new session.
#[derive(Debug, Default)]
pub struct ProgressSteps {
    total: u64,
    transferred: u64,
    step: Option<u8>,
}

impl ProgressSteps {
    /// Returns the step reached by `p` when it is a new one.
    pub fn observe(&mut self, p: Progress) -> Option<u8> {
        if p.total != self.total || p.transferred < self.transferred {
            self.step = None;
        }
        self.total = p.total;
        self.transferred = p.transferred;

        let step = p.percent() / PROGRESS_STEP * PROGRESS_STEP;
        if self.step.is_some_and(|last| last >= step) {
            return None;
        }
        self.step = Some(step);
        Some(step)
    }
}
