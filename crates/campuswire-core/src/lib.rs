//! campuswire core: transport-agnostic protocol primitives and error types.
//!
//! This crate defines the envelope carried between the campus client and
//! server, the frame codec that puts exactly one envelope on the wire per
//! frame, and the shared error surface. It intentionally carries no transport
//! or runtime dependencies so the server (tokio) and the blocking client can
//! both reuse it.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! All fallible paths must surface as `WireError`/`Result` so a malformed
//! frame or hostile peer never crashes a process.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod envelope;
pub mod error;
pub mod frame;

/// Shared result type.
pub use error::{Result, WireError};

pub use envelope::{Code, Envelope, MsgType};
