//! Dispatch table: operation type -> handler.
//!
//! Domain modules (library, repairs, payments, courses, shop) register their
//! handlers here at startup; the connection loop stays agnostic to how many
//! operations exist. A handler returns the response payload or a `WireError`
//! that maps onto a response code; errors never cross this boundary as
//! anything but data.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;

use campuswire_core::error::{Result, WireError};
use campuswire_core::MsgType;

use crate::registry::ConnectionRegistry;

/// Per-request context handed to handlers.
///
/// Carries the origin of the request and registry access for the
/// server-to-client push path (addressed send, broadcast). Handlers run on
/// their connection's task; blocking here blocks only that connection.
#[derive(Clone)]
pub struct RequestCtx {
    conn_id: u64,
    sender: Option<Arc<str>>,
    registry: Arc<ConnectionRegistry>,
}

impl RequestCtx {
    pub fn new(conn_id: u64, sender: Option<String>, registry: Arc<ConnectionRegistry>) -> Self {
        Self {
            conn_id,
            sender: sender.map(Arc::<str>::from),
            registry,
        }
    }

    pub fn conn_id(&self) -> u64 {
        self.conn_id
    }

    pub fn sender(&self) -> Option<&str> {
        self.sender.as_deref()
    }

    /// Queue an envelope onto another live connection.
    pub fn send_to(&self, conn_id: u64, env: campuswire_core::Envelope) -> Result<()> {
        self.registry.send_to(conn_id, env)
    }

    /// Queue an envelope onto every other live connection.
    pub async fn broadcast_others(&self, env: &campuswire_core::Envelope) -> usize {
        self.registry.broadcast(env, Some(self.conn_id)).await
    }
}

/// One registered operation.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Operation this handler answers.
    fn msg_type(&self) -> MsgType;

    async fn handle(&self, ctx: RequestCtx, payload: Value) -> Result<Value>;
}

/// Registry and dispatcher for operation handlers.
#[derive(Default)]
pub struct Dispatcher {
    handlers: DashMap<MsgType, Arc<dyn Handler>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            handlers: DashMap::new(),
        }
    }

    pub fn register(&self, handler: Arc<dyn Handler>) {
        self.handlers.insert(handler.msg_type(), handler);
    }

    /// Register a plain async closure, for domain modules that don't want a
    /// handler struct of their own.
    pub fn register_fn<F, Fut>(&self, msg_type: MsgType, f: F)
    where
        F: Fn(RequestCtx, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        self.register(Arc::new(FnHandler { msg_type, f }));
    }

    pub fn contains(&self, msg_type: &MsgType) -> bool {
        self.handlers.contains_key(msg_type)
    }

    pub fn registered_types(&self) -> Vec<MsgType> {
        self.handlers.iter().map(|e| e.key().clone()).collect()
    }

    pub async fn dispatch(
        &self,
        ctx: RequestCtx,
        msg_type: &MsgType,
        payload: Value,
    ) -> Result<Value> {
        let handler = self
            .handlers
            .get(msg_type)
            .ok_or_else(|| WireError::Unsupported(msg_type.wire_name().to_owned()))?
            .value()
            .clone();
        handler.handle(ctx, payload).await
    }
}

struct FnHandler<F> {
    msg_type: MsgType,
    f: F,
}

#[async_trait]
impl<F, Fut> Handler for FnHandler<F>
where
    F: Fn(RequestCtx, Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    fn msg_type(&self) -> MsgType {
        self.msg_type.clone()
    }

    async fn handle(&self, ctx: RequestCtx, payload: Value) -> Result<Value> {
        (self.f)(ctx, payload).await
    }
}
