//! Live-connection registry.
//!
//! The registry is the only state shared across connection tasks. It maps a
//! connection id to the handle of the task that owns the socket. The handle
//! carries the connection's outbound queue sender and its close signal, never
//! the socket itself: every outbound frame, addressed or broadcast, goes
//! through the owning task so frames cannot interleave on the wire.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use futures_util::stream::FuturesUnordered;
use futures_util::StreamExt;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::Sender;
use tokio::sync::Notify;
use tokio::time::{timeout, Duration};

use campuswire_core::error::{Result, WireError};
use campuswire_core::Envelope;

/// Per-connection delivery cap for broadcast fan-out.
const BROADCAST_SEND_TIMEOUT: Duration = Duration::from_millis(1500);

/// One connection's outbound queue sender and close signal.
#[derive(Clone)]
pub struct ConnectionHandle {
    pub tx: Sender<Envelope>,
    pub close: Arc<Notify>,
}

/// `connection id -> ConnectionHandle`, plus the id source.
///
/// Entries are inserted when a connection task starts and removed on every
/// exit path; a missing id during `send_to` is an expected race with a
/// concurrent disconnect, not a fault.
#[derive(Default)]
pub struct ConnectionRegistry {
    conns: DashMap<u64, ConnectionHandle>,
    seq: AtomicU64,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            conns: DashMap::new(),
            seq: AtomicU64::new(1),
        }
    }

    pub fn next_id(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::Relaxed)
    }

    pub fn insert(&self, conn_id: u64, handle: ConnectionHandle) {
        self.conns.insert(conn_id, handle);
    }

    pub fn remove(&self, conn_id: u64) -> Option<ConnectionHandle> {
        self.conns.remove(&conn_id).map(|(_, h)| h)
    }

    pub fn get(&self, conn_id: u64) -> Option<ConnectionHandle> {
        self.conns.get(&conn_id).map(|r| r.value().clone())
    }

    pub fn ids(&self) -> Vec<u64> {
        self.conns.iter().map(|e| *e.key()).collect()
    }

    pub fn len(&self) -> usize {
        self.conns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conns.is_empty()
    }

    /// Queue one envelope onto a specific connection.
    pub fn send_to(&self, conn_id: u64, env: Envelope) -> Result<()> {
        let handle = self
            .conns
            .get(&conn_id)
            .ok_or_else(|| WireError::NotFound(format!("connection {conn_id}")))?;
        handle.tx.try_send(env).map_err(|e| match e {
            TrySendError::Closed(_) => WireError::NotFound(format!("connection {conn_id} closing")),
            TrySendError::Full(_) => {
                WireError::Internal(format!("connection {conn_id} outbound queue full"))
            }
        })
    }

    /// Queue one envelope onto every live connection except `exclude`,
    /// concurrently with a per-connection timeout. A slow or dying
    /// connection never blocks delivery to the rest. Returns the number of
    /// connections the envelope was queued for.
    pub async fn broadcast(&self, env: &Envelope, exclude: Option<u64>) -> usize {
        let mut futs = FuturesUnordered::new();
        for entry in self.conns.iter() {
            let conn_id = *entry.key();
            if Some(conn_id) == exclude {
                continue;
            }
            let tx = entry.value().tx.clone();
            let env = env.clone();
            futs.push(async move {
                match timeout(BROADCAST_SEND_TIMEOUT, tx.send(env)).await {
                    Ok(Ok(())) => true,
                    Ok(Err(_)) => {
                        tracing::debug!(conn_id, "broadcast skipped: connection closing");
                        false
                    }
                    Err(_) => {
                        tracing::debug!(conn_id, "broadcast send timed out");
                        false
                    }
                }
            });
        }

        let mut delivered = 0;
        while let Some(ok) = futs.next().await {
            if ok {
                delivered += 1;
            }
        }
        delivered
    }

    /// Ask every live connection to close. The permit sticks, so a
    /// connection between select polls still observes it.
    pub fn close_all(&self) {
        for entry in self.conns.iter() {
            entry.value().close.notify_one();
        }
    }
}
