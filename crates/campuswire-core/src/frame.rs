//! Length-prefixed frame codec (panic-free).
//!
//! One frame carries exactly one [`Envelope`]: a 4-byte big-endian body
//! length followed by the JSON body. Keeping the frame self-delimiting keeps
//! both read loops trivial (read header, read body, decode, repeat) with no
//! partial-message state machine.
//!
//! Parsing rules:
//! - The declared length is checked against the caller's bound before any
//!   body allocation happens.
//! - Never `unwrap()` / `expect()` / `panic!()` in production paths.

use bytes::{BufMut, Bytes, BytesMut};

use crate::envelope::Envelope;
use crate::error::{Result, WireError};

/// Size of the length prefix.
pub const HEADER_LEN: usize = 4;

/// Default bound on a single frame body. A peer declaring more than this is
/// treated as hostile and the connection closes.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 256 * 1024;

/// Encode one envelope into a self-delimiting frame.
pub fn encode(env: &Envelope) -> Result<Bytes> {
    let body = serde_json::to_vec(env)
        .map_err(|e| WireError::Internal(format!("envelope encode failed: {e}")))?;
    if body.len() > u32::MAX as usize {
        return Err(WireError::FrameTooLarge {
            len: body.len(),
            max: u32::MAX as usize,
        });
    }
    let mut buf = BytesMut::with_capacity(HEADER_LEN + body.len());
    buf.put_u32(body.len() as u32);
    buf.put_slice(&body);
    Ok(buf.freeze())
}

/// Validate a frame header and return the body length to read next.
///
/// Rejects empty frames and anything beyond `max` before the caller
/// allocates a body buffer.
pub fn body_len(header: [u8; HEADER_LEN], max: usize) -> Result<usize> {
    let len = u32::from_be_bytes(header) as usize;
    if len == 0 {
        return Err(WireError::BadFrame("zero-length frame".into()));
    }
    if len > max {
        return Err(WireError::FrameTooLarge { len, max });
    }
    Ok(len)
}

/// Decode a fully-read frame body back into an envelope.
pub fn decode_body(body: &[u8]) -> Result<Envelope> {
    serde_json::from_slice(body)
        .map_err(|e| WireError::BadFrame(format!("invalid envelope json: {e}")))
}
