//! campuswire client façade.
//!
//! The blocking mirror of the server: one socket, one logical session, and a
//! single synchronous `request()` that UI event handlers call and wait on.
//! Each connection carries exactly one in-flight request, so the matching
//! response is simply the next frame read back; the internal mutex
//! serializes the whole write-then-read sequence to keep that true even if
//! screens share one `Client`.
//!
//! The façade never reconnects on its own. After an I/O or protocol failure
//! the dead stream is dropped and later calls fail fast with
//! [`ClientError::NotConnected`]; reconnection policy belongs to the caller.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;

use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use serde_json::Value;

use campuswire_core::frame::{self, HEADER_LEN};
use campuswire_core::{Envelope, MsgType};

pub use error::{ClientError, Result};

struct Conn {
    stream: TcpStream,
}

/// One logical session against the campus server.
pub struct Client {
    inner: Mutex<Option<Conn>>,
    sender: Option<String>,
    timeout: Option<Duration>,
    max_frame_bytes: usize,
}

fn lock(m: &Mutex<Option<Conn>>) -> MutexGuard<'_, Option<Conn>> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

impl Client {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(None),
            sender: None,
            timeout: None,
            max_frame_bytes: frame::DEFAULT_MAX_FRAME_BYTES,
        }
    }

    /// Origin label attached to every request (shows up in server logs and
    /// addressed sends).
    pub fn with_sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = Some(sender.into());
        self
    }

    /// Read/write deadline applied to the socket. Without one, `request`
    /// blocks for as long as the server takes.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn is_connected(&self) -> bool {
        lock(&self.inner).is_some()
    }

    /// Open the session's socket. One socket at a time; `disconnect` first
    /// to reconnect elsewhere.
    pub fn connect(&self, host: &str, port: u16) -> Result<()> {
        let mut guard = lock(&self.inner);
        if guard.is_some() {
            return Err(ClientError::AlreadyConnected);
        }
        let stream = TcpStream::connect((host, port))?;
        stream.set_nodelay(true)?;
        stream.set_read_timeout(self.timeout)?;
        stream.set_write_timeout(self.timeout)?;
        tracing::debug!(host, port, "connected");
        *guard = Some(Conn { stream });
        Ok(())
    }

    /// Send one request and block until its response arrives.
    ///
    /// The guard is held across the whole exchange, so a second caller
    /// cannot interleave a request before this one's response is read.
    pub fn request(&self, msg_type: MsgType, payload: Value) -> Result<Envelope> {
        let mut guard = lock(&self.inner);
        let conn = guard.as_mut().ok_or(ClientError::NotConnected)?;

        let mut env = Envelope::request(msg_type, payload);
        if let Some(sender) = &self.sender {
            env = env.with_sender(sender.clone());
        }

        let result = exchange(conn, &env, self.max_frame_bytes);
        if result.is_err() {
            // The stream can no longer be trusted; drop it so later calls
            // fail fast instead of reading a stale or torn frame.
            *guard = None;
        }
        result
    }

    /// Close the socket. Idempotent; later `request` calls fail fast.
    pub fn disconnect(&self) {
        if lock(&self.inner).take().is_some() {
            tracing::debug!("disconnected");
        }
    }
}

fn exchange(conn: &mut Conn, env: &Envelope, max_frame_bytes: usize) -> Result<Envelope> {
    let bytes = frame::encode(env)?;
    conn.stream.write_all(&bytes)?;
    conn.stream.flush()?;

    let mut header = [0u8; HEADER_LEN];
    conn.stream.read_exact(&mut header)?;
    let len = frame::body_len(header, max_frame_bytes)?;
    let mut body = vec![0u8; len];
    conn.stream.read_exact(&mut body)?;
    Ok(frame::decode_body(&body)?)
}
