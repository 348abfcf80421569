//! Per-connection session loop.
//!
//! One task owns one accepted socket for its whole life: register in the
//! registry, then read one frame, dispatch, answer, repeat, and deregister on
//! the way out. A companion writer task drains the connection's outbound
//! queue and is the only thing that ever touches the write half, so response
//! frames and pushed frames cannot interleave.
//!
//! Handler failures of every kind (returned error, panic) become response
//! envelopes; only transport failures, the peer's disconnect, the idle
//! deadline, an explicit logout, or a server close request end the loop.

use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::sync::{Notify, OwnedSemaphorePermit};
use tokio::time::{timeout, Duration};

use campuswire_core::{Envelope, MsgType, WireError};

use crate::dispatch::{Dispatcher, RequestCtx};
use crate::registry::{ConnectionHandle, ConnectionRegistry};
use crate::transport;

/// Limits a connection runs under, taken from the server config.
#[derive(Clone, Copy)]
pub(crate) struct ConnLimits {
    pub max_frame_bytes: usize,
    pub idle_timeout: Option<Duration>,
    pub outbound_queue: usize,
}

enum ReadOutcome {
    Frame(Envelope),
    PeerClosed,
    Idle,
    Failed(WireError),
}

async fn read_one(
    read_half: &mut tokio::net::tcp::OwnedReadHalf,
    max_frame_bytes: usize,
    idle_timeout: Option<Duration>,
) -> ReadOutcome {
    let read = transport::read_envelope(read_half, max_frame_bytes);
    let result = match idle_timeout {
        Some(deadline) => match timeout(deadline, read).await {
            Ok(r) => r,
            Err(_) => return ReadOutcome::Idle,
        },
        None => read.await,
    };
    match result {
        Ok(Some(env)) => ReadOutcome::Frame(env),
        Ok(None) => ReadOutcome::PeerClosed,
        Err(e) => ReadOutcome::Failed(e),
    }
}

/// Convert a dispatch outcome into the response envelope. A panicking
/// handler is contained here and answered like any other internal failure.
async fn answer(dispatcher: &Dispatcher, ctx: RequestCtx, env: &Envelope) -> Envelope {
    let fut = dispatcher.dispatch(ctx, &env.msg_type, env.payload.clone());
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(Ok(value)) => env.reply_ok(value),
        Ok(Err(e)) => {
            tracing::debug!(msg_type = %env.msg_type, error = %e, "handler returned error");
            env.reply_err(&e)
        }
        Err(_) => {
            tracing::error!(msg_type = %env.msg_type, "handler panicked");
            env.reply_err(&WireError::Internal(format!(
                "handler for {} panicked",
                env.msg_type
            )))
        }
    }
}

pub(crate) async fn run_connection(
    conn_id: u64,
    stream: TcpStream,
    peer: SocketAddr,
    dispatcher: Arc<Dispatcher>,
    registry: Arc<ConnectionRegistry>,
    limits: ConnLimits,
    _permit: OwnedSemaphorePermit,
) {
    let (mut read_half, mut write_half) = stream.into_split();
    let (tx, mut rx) = mpsc::channel::<Envelope>(limits.outbound_queue);
    let close = Arc::new(Notify::new());

    registry.insert(
        conn_id,
        ConnectionHandle {
            tx: tx.clone(),
            close: close.clone(),
        },
    );
    tracing::info!(conn_id, %peer, "connection opened");

    // Sole writer to this socket. Exits once every sender is dropped and the
    // queue is drained, so the final response of a closing connection still
    // goes out.
    let writer = tokio::spawn(async move {
        while let Some(env) = rx.recv().await {
            if let Err(e) = transport::write_envelope(&mut write_half, &env).await {
                tracing::debug!(conn_id, error = %e, "write failed, stopping writer");
                break;
            }
        }
    });

    loop {
        let outcome = tokio::select! {
            _ = close.notified() => {
                tracing::info!(conn_id, "close requested by server");
                break;
            }
            outcome = read_one(&mut read_half, limits.max_frame_bytes, limits.idle_timeout) => outcome,
        };

        let env = match outcome {
            ReadOutcome::Frame(env) => env,
            ReadOutcome::PeerClosed => {
                tracing::info!(conn_id, "peer disconnected");
                break;
            }
            ReadOutcome::Idle => {
                tracing::info!(conn_id, "idle deadline reached, closing");
                break;
            }
            ReadOutcome::Failed(e) => {
                tracing::warn!(conn_id, error = %e, "transport failure, closing");
                break;
            }
        };

        let is_logout = env.msg_type == MsgType::UserLogout;
        let ctx = RequestCtx::new(conn_id, env.sender.clone(), registry.clone());

        // Logout has connection-level meaning even with no session handler
        // registered: acknowledge, then close.
        let resp = if is_logout && !dispatcher.contains(&env.msg_type) {
            env.reply_ok(Value::Null)
        } else {
            answer(&dispatcher, ctx, &env).await
        };

        tracing::debug!(
            conn_id,
            req_id = env.id,
            msg_type = %env.msg_type,
            code = resp.code.as_str(),
            "request answered"
        );

        if tx.send(resp).await.is_err() {
            tracing::warn!(conn_id, "outbound queue closed, dropping response");
            break;
        }

        if is_logout {
            tracing::info!(conn_id, "logout requested, closing");
            break;
        }
    }

    registry.remove(conn_id);
    drop(tx);
    let _ = writer.await;
    tracing::info!(conn_id, "connection closed");
}
