//! Accept loop and server lifecycle.
//!
//! The server owns the listening socket, the capacity bound, and the
//! registry of live connections. Each accepted socket gets its own task
//! running the session loop in `connection.rs`; the accept loop itself never
//! blocks on a saturated capacity: sockets beyond the bound are closed
//! immediately with no frame, and `stop()` stays reachable throughout.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use dashmap::DashMap;
use tokio::net::TcpListener;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::{timeout, Duration, Instant};

use campuswire_core::error::{Result, WireError};
use campuswire_core::Envelope;

use crate::config::ServerConfig;
use crate::connection::{run_connection, ConnLimits};
use crate::dispatch::Dispatcher;
use crate::registry::ConnectionRegistry;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

pub struct Server {
    cfg: ServerConfig,
    dispatcher: Arc<Dispatcher>,
    registry: Arc<ConnectionRegistry>,
    capacity: Arc<Semaphore>,
    listener: Mutex<Option<TcpListener>>,
    local_addr: SocketAddr,
    accept_task: Mutex<Option<JoinHandle<()>>>,
    conn_tasks: Arc<DashMap<u64, JoinHandle<()>>>,
    shutdown: watch::Sender<bool>,
    stopped: AtomicBool,
}

impl Server {
    /// Bind the listening socket up front. Fails fast when the port is
    /// taken; nothing is accepted until `start()`.
    pub async fn bind(cfg: ServerConfig, dispatcher: Arc<Dispatcher>) -> Result<Self> {
        let listener = TcpListener::bind(&cfg.server.listen)
            .await
            .map_err(|e| WireError::Internal(format!("bind {} failed: {e}", cfg.server.listen)))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| WireError::Internal(format!("local_addr failed: {e}")))?;
        tracing::info!(%local_addr, "listening");

        let (shutdown, _) = watch::channel(false);
        Ok(Self {
            capacity: Arc::new(Semaphore::new(cfg.server.max_connections)),
            cfg,
            dispatcher,
            registry: Arc::new(ConnectionRegistry::new()),
            listener: Mutex::new(Some(listener)),
            local_addr,
            accept_task: Mutex::new(None),
            conn_tasks: Arc::new(DashMap::new()),
            shutdown,
            stopped: AtomicBool::new(false),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn registry(&self) -> Arc<ConnectionRegistry> {
        self.registry.clone()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.cfg
    }

    /// Spawn the accept loop. Callable once.
    pub fn start(&self) -> Result<()> {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(WireError::Internal("server already stopped".into()));
        }
        let listener = lock(&self.listener)
            .take()
            .ok_or_else(|| WireError::Internal("server already started".into()))?;

        let limits = ConnLimits {
            max_frame_bytes: self.cfg.server.max_frame_bytes,
            idle_timeout: match self.cfg.server.idle_timeout_ms {
                0 => None,
                ms => Some(Duration::from_millis(ms)),
            },
            outbound_queue: self.cfg.server.outbound_queue,
        };

        let dispatcher = self.dispatcher.clone();
        let registry = self.registry.clone();
        let capacity = self.capacity.clone();
        let conn_tasks = self.conn_tasks.clone();
        let mut shutdown_rx = self.shutdown.subscribe();

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    accepted = listener.accept() => {
                        match accepted {
                            Ok((stream, peer)) => {
                                conn_tasks.retain(|_, h| !h.is_finished());

                                let permit = match capacity.clone().try_acquire_owned() {
                                    Ok(p) => p,
                                    Err(_) => {
                                        tracing::warn!(%peer, "connection refused: server at capacity");
                                        continue;
                                    }
                                };
                                if let Err(e) = stream.set_nodelay(true) {
                                    tracing::debug!(%peer, error = %e, "set_nodelay failed");
                                }

                                let conn_id = registry.next_id();
                                let handle = tokio::spawn(run_connection(
                                    conn_id,
                                    stream,
                                    peer,
                                    dispatcher.clone(),
                                    registry.clone(),
                                    limits,
                                    permit,
                                ));
                                conn_tasks.insert(conn_id, handle);
                            }
                            Err(e) => {
                                tracing::warn!(error = %e, "accept failed");
                            }
                        }
                    }
                }
            }
            tracing::info!("accept loop stopped");
        });

        *lock(&self.accept_task) = Some(task);
        Ok(())
    }

    /// Graceful shutdown: stop accepting, ask every connection to close,
    /// wait up to the configured grace period, abort stragglers. Idempotent;
    /// fine to call with zero live connections.
    pub async fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::info!("server stopping");

        let _ = self.shutdown.send(true);
        let accept = lock(&self.accept_task).take();
        if let Some(handle) = accept {
            let _ = handle.await;
        }

        self.registry.close_all();

        let deadline = Instant::now() + Duration::from_millis(self.cfg.server.shutdown_grace_ms);
        let ids: Vec<u64> = self.conn_tasks.iter().map(|e| *e.key()).collect();
        for id in ids {
            if let Some((_, mut handle)) = self.conn_tasks.remove(&id) {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if timeout(remaining, &mut handle).await.is_err() {
                    tracing::warn!(conn_id = id, "grace period expired, aborting connection task");
                    handle.abort();
                }
            }
        }
        tracing::info!("server stopped");
    }

    /// Queue an envelope onto every live connection except `exclude`.
    pub async fn broadcast(&self, env: &Envelope, exclude: Option<u64>) -> usize {
        self.registry.broadcast(env, exclude).await
    }

    /// Queue an envelope onto one live connection. `NotFound` when the
    /// connection already closed, an expected race rather than a fault.
    pub fn send_to(&self, conn_id: u64, env: Envelope) -> Result<()> {
        self.registry.send_to(conn_id, env)
    }
}
