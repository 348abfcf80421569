use async_trait::async_trait;
use serde_json::Value;

use campuswire_core::error::Result;
use campuswire_core::MsgType;

use crate::dispatch::{Handler, RequestCtx};

/// Returns its payload unchanged. Useful to prove the wire path end to end.
#[derive(Default)]
pub struct EchoService;

impl EchoService {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Handler for EchoService {
    fn msg_type(&self) -> MsgType {
        MsgType::EchoTest
    }

    async fn handle(&self, _ctx: RequestCtx, payload: Value) -> Result<Value> {
        Ok(payload)
    }
}
