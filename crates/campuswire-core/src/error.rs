//! Shared error type across campuswire crates.

use thiserror::Error;

use crate::envelope::Code;

/// Shared result type.
pub type Result<T> = std::result::Result<T, WireError>;

/// Unified error type used by core, server, and built-in services.
///
/// Transport-level variants (`BadFrame`, `FrameTooLarge`) mean the byte
/// stream can no longer be trusted and the connection must close. Everything
/// else maps onto a response [`Code`] and travels back to the caller as data.
#[derive(Debug, Error)]
pub enum WireError {
    /// Malformed or truncated frame; the stream is unrecoverable.
    #[error("bad frame: {0}")]
    BadFrame(String),
    /// Declared frame length exceeds the configured bound.
    #[error("frame of {len} bytes exceeds limit of {max}")]
    FrameTooLarge { len: usize, max: usize },
    /// No handler registered for the requested operation.
    #[error("unsupported operation: {0}")]
    Unsupported(String),
    /// Invalid input for an otherwise known operation.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Credentials rejected.
    #[error("auth failed")]
    AuthFailed,
    /// Caller lacks permission.
    #[error("not allowed: {0}")]
    NotAllowed(String),
    /// Addressed entity does not exist (row, connection id, ...).
    #[error("not found: {0}")]
    NotFound(String),
    /// Concurrent-update or uniqueness conflict.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Internal failure inside the server or a handler.
    #[error("internal: {0}")]
    Internal(String),
}

impl WireError {
    /// Map to the stable wire-level outcome code carried on responses.
    pub fn code(&self) -> Code {
        match self {
            WireError::AuthFailed => Code::AuthFailed,
            WireError::NotAllowed(_) => Code::NotAllowed,
            WireError::NotFound(_) => Code::NotFound,
            WireError::Conflict(_) => Code::Conflict,
            WireError::BadFrame(_)
            | WireError::FrameTooLarge { .. }
            | WireError::Unsupported(_)
            | WireError::BadRequest(_)
            | WireError::Internal(_) => Code::Error,
        }
    }

    /// True for errors that poison the byte stream itself; the owning
    /// connection must close instead of answering.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            WireError::BadFrame(_) | WireError::FrameTooLarge { .. }
        )
    }
}
