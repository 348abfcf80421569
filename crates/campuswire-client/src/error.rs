//! Client-side error surface.

use thiserror::Error;

use campuswire_core::WireError;

pub type Result<T> = std::result::Result<T, ClientError>;

/// Failures a caller of the façade can observe. I/O and protocol failures
/// stay distinguishable so the UI layer can choose its own retry policy.
#[derive(Debug, Error)]
pub enum ClientError {
    /// No live connection; `connect` first.
    #[error("not connected")]
    NotConnected,
    /// A connection is already open; `disconnect` first.
    #[error("already connected")]
    AlreadyConnected,
    /// Socket-level failure. The connection is dropped; callers fail fast
    /// until they reconnect.
    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),
    /// Frame or envelope decode failure. The stream is untrustworthy and the
    /// connection is dropped.
    #[error("protocol failure: {0}")]
    Protocol(#[from] WireError),
}
