//! Async frame I/O over a TCP stream.
//!
//! Thin adapters between the core frame codec and tokio's byte streams: read
//! exactly one envelope per call, write exactly one envelope per call. Any
//! error here poisons the stream and the caller must close the connection.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use campuswire_core::error::{Result, WireError};
use campuswire_core::frame::{self, HEADER_LEN};
use campuswire_core::Envelope;

/// Read one envelope. `Ok(None)` means the peer closed the stream.
pub async fn read_envelope<R>(r: &mut R, max_frame_bytes: usize) -> Result<Option<Envelope>>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; HEADER_LEN];
    match r.read_exact(&mut header).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(WireError::BadFrame(format!("header read failed: {e}"))),
    }

    let len = frame::body_len(header, max_frame_bytes)?;
    let mut body = vec![0u8; len];
    r.read_exact(&mut body)
        .await
        .map_err(|e| WireError::BadFrame(format!("body read failed: {e}")))?;

    frame::decode_body(&body).map(Some)
}

/// Write one envelope and flush.
pub async fn write_envelope<W>(w: &mut W, env: &Envelope) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let bytes = frame::encode(env)?;
    w.write_all(&bytes)
        .await
        .map_err(|e| WireError::BadFrame(format!("write failed: {e}")))?;
    w.flush()
        .await
        .map_err(|e| WireError::BadFrame(format!("flush failed: {e}")))?;
    Ok(())
}
