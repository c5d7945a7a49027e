//! TCP data channel for pushing one file per connection.
//!
//! The sender ([`client`]) announces the file, waits for the receiver
//! to be ready, then streams the content and half-closes. The receiver
//! ([`server`]) accepts connections one at a time and writes each pushed
//! file into its output directory until the sender closes.
//!
//! # Wire format
//!
//! See [`filepush_protocol::wire`] for the byte-exact layout.

pub mod client;
pub mod error;
pub mod report;
pub mod server;
pub mod session;
pub mod validation;

pub use client::{PushOptions, SourceFile, TcpPushClient, send_file};
pub use error::{SessionFailure, TransferError};
pub use report::{Outcome, Progress, ProgressSteps, TransferReport};
pub use server::{ReceiveOptions, SessionResult, TcpPushServer, receive_file};
pub use session::{Role, SessionState, TransferSession};
pub use validation::validate_file_name;

pub use filepush_protocol::{DEFAULT_CHUNK_SIZE, DEFAULT_PORT, FileMeta};

/// Capacity of progress channels created by callers that only log.
pub const PROGRESS_CHANNEL_CAPACITY: usize = 64;
