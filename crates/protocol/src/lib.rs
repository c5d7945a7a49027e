//! Wire format for single-file pushes.
//!
//! A push is three phases on one stream connection:
//! a metadata line from the sender, a two-byte readiness
//! acknowledgment from the receiver, then raw file content terminated
//! by the sender closing its write side.
//!
//! # Wire format
//!
//! See [`wire`] module for the byte-exact layout.

pub mod error;
pub mod wire;

pub use error::ProtocolError;
pub use wire::FileMeta;

/// Default port both roles agree on.
pub const DEFAULT_PORT: u16 = 8877;

/// Default content chunk size (100 KiB).
///
/// Tunable on either side; the receiver accepts any chunk boundaries.
pub const DEFAULT_CHUNK_SIZE: usize = 100 * 1024;
