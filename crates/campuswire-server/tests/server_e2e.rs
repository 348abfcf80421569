//! End-to-end tests: blocking client façade against a live server.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::Arc;

use serde_json::{json, Value};

use campuswire_client::{Client, ClientError};
use campuswire_core::{Code, MsgType, WireError};
use campuswire_server::config::ServerConfig;
use campuswire_server::dispatch::Dispatcher;
use campuswire_server::server::Server;
use campuswire_server::services::EchoService;

fn test_cfg() -> ServerConfig {
    let mut cfg = ServerConfig::default();
    cfg.server.listen = "127.0.0.1:0".into();
    cfg
}

fn test_dispatcher() -> Arc<Dispatcher> {
    let dispatcher = Arc::new(Dispatcher::new());
    dispatcher.register(Arc::new(EchoService::new()));
    dispatcher.register_fn(MsgType::Other("DIVIDE".into()), |_ctx, payload| async move {
        let a = payload["a"]
            .as_i64()
            .ok_or_else(|| WireError::BadRequest("a must be a number".into()))?;
        let b = payload["b"]
            .as_i64()
            .ok_or_else(|| WireError::BadRequest("b must be a number".into()))?;
        if b == 0 {
            return Err(WireError::BadRequest("division by zero".into()));
        }
        Ok(json!(a / b))
    });
    dispatcher
}

async fn start_server(cfg: ServerConfig) -> Server {
    let server = Server::bind(cfg, test_dispatcher()).await.unwrap();
    server.start().unwrap();
    server
}

fn connect(server: &Server) -> Client {
    let addr = server.local_addr();
    let client = Client::new().with_sender("test-ui");
    client.connect(&addr.ip().to_string(), addr.port()).unwrap();
    client
}

#[tokio::test]
async fn echo_round_trip() {
    let server = start_server(test_cfg()).await;
    let resp = tokio::task::spawn_blocking({
        let client = connect(&server);
        move || {
            let r = client.request(MsgType::EchoTest, json!("ping")).unwrap();
            client.disconnect();
            r
        }
    })
    .await
    .unwrap();

    assert_eq!(resp.code, Code::Success);
    assert_eq!(resp.msg_type, MsgType::EchoTest);
    assert_eq!(resp.payload, json!("ping"));
    server.stop().await;
}

#[tokio::test]
async fn unknown_operation_keeps_connection_usable() {
    let server = start_server(test_cfg()).await;
    let (bad, good) = tokio::task::spawn_blocking({
        let client = connect(&server);
        move || {
            let bad = client
                .request(MsgType::Other("UNKNOWN_999".into()), Value::Null)
                .unwrap();
            let good = client.request(MsgType::EchoTest, json!("still here")).unwrap();
            (bad, good)
        }
    })
    .await
    .unwrap();

    assert_eq!(bad.code, Code::Error);
    assert!(bad
        .payload
        .as_str()
        .unwrap()
        .contains("unsupported operation"));
    assert_eq!(good.code, Code::Success);
    assert_eq!(good.payload, json!("still here"));
    server.stop().await;
}

#[tokio::test]
async fn failing_handler_keeps_connection_usable() {
    let server = start_server(test_cfg()).await;
    let (div0, ok, echo) = tokio::task::spawn_blocking({
        let client = connect(&server);
        move || {
            let divide = MsgType::Other("DIVIDE".into());
            let div0 = client
                .request(divide.clone(), json!({ "a": 1, "b": 0 }))
                .unwrap();
            let ok = client.request(divide, json!({ "a": 6, "b": 3 })).unwrap();
            let echo = client.request(MsgType::EchoTest, json!(1)).unwrap();
            (div0, ok, echo)
        }
    })
    .await
    .unwrap();

    assert_eq!(div0.code, Code::Error);
    assert!(div0.payload.as_str().unwrap().contains("division by zero"));
    assert_eq!(ok.code, Code::Success);
    assert_eq!(ok.payload, json!(2));
    assert_eq!(echo.code, Code::Success);
    server.stop().await;
}

#[tokio::test]
async fn panicking_handler_is_contained() {
    let cfg = test_cfg();
    let dispatcher = test_dispatcher();
    dispatcher.register_fn(MsgType::Other("BOOM".into()), |_ctx, _payload| async move {
        panic!("boom");
        #[allow(unreachable_code)]
        Ok(Value::Null)
    });
    let server = Server::bind(cfg, dispatcher).await.unwrap();
    server.start().unwrap();

    let (boom, echo) = tokio::task::spawn_blocking({
        let client = connect(&server);
        move || {
            let boom = client
                .request(MsgType::Other("BOOM".into()), Value::Null)
                .unwrap();
            let echo = client.request(MsgType::EchoTest, json!("alive")).unwrap();
            (boom, echo)
        }
    })
    .await
    .unwrap();

    assert_eq!(boom.code, Code::Error);
    assert!(boom.payload.as_str().unwrap().contains("panicked"));
    assert_eq!(echo.code, Code::Success);
    server.stop().await;
}

#[tokio::test]
async fn concurrent_clients_get_uncorrelated_responses() {
    let server = start_server(test_cfg()).await;
    let addr = server.local_addr();

    let mut tasks = Vec::new();
    for i in 0..8u64 {
        tasks.push(tokio::task::spawn_blocking(move || {
            let client = Client::new();
            client.connect(&addr.ip().to_string(), addr.port()).unwrap();
            let resp = client
                .request(MsgType::EchoTest, json!({ "client": i }))
                .unwrap();
            client.disconnect();
            (i, resp)
        }));
    }
    for task in tasks {
        let (i, resp) = task.await.unwrap();
        assert_eq!(resp.code, Code::Success);
        assert_eq!(resp.payload, json!({ "client": i }));
    }
    server.stop().await;
}

#[tokio::test]
async fn stop_is_idempotent_with_zero_connections() {
    let server = start_server(test_cfg()).await;
    server.stop().await;
    server.stop().await;
}

#[tokio::test]
async fn stop_closes_live_connections() {
    let server = start_server(test_cfg()).await;
    let client = Arc::new(connect(&server));

    let warm = tokio::task::spawn_blocking({
        let client = client.clone();
        move || client.request(MsgType::EchoTest, json!("warm")).unwrap()
    })
    .await
    .unwrap();
    assert_eq!(warm.code, Code::Success);

    server.stop().await;

    let err = tokio::task::spawn_blocking({
        let client = client.clone();
        move || client.request(MsgType::EchoTest, json!("late")).unwrap_err()
    })
    .await
    .unwrap();
    assert!(matches!(err, ClientError::Io(_) | ClientError::Protocol(_)));
}

#[tokio::test]
async fn logout_closes_the_connection() {
    let server = start_server(test_cfg()).await;
    let (bye, after) = tokio::task::spawn_blocking({
        let client = connect(&server);
        move || {
            let bye = client.request(MsgType::UserLogout, Value::Null).unwrap();
            let after = client.request(MsgType::EchoTest, json!("ghost"));
            (bye, after)
        }
    })
    .await
    .unwrap();

    assert_eq!(bye.code, Code::Success);
    assert!(after.is_err());
    server.stop().await;
}

#[tokio::test]
async fn saturated_server_refuses_new_connections() {
    let mut cfg = test_cfg();
    cfg.server.max_connections = 1;
    let server = start_server(cfg).await;
    let addr = server.local_addr();

    let holder = Arc::new(connect(&server));
    let warm = tokio::task::spawn_blocking({
        let holder = holder.clone();
        move || holder.request(MsgType::EchoTest, json!("hold")).unwrap()
    })
    .await
    .unwrap();
    assert_eq!(warm.code, Code::Success);

    // Second connection is accepted at the OS level, then closed with no
    // frame once the capacity check fails.
    let refused = tokio::task::spawn_blocking(move || {
        let client = Client::new();
        client.connect(&addr.ip().to_string(), addr.port()).unwrap();
        client.request(MsgType::EchoTest, json!("excess"))
    })
    .await
    .unwrap();
    assert!(refused.is_err());

    // The held connection is unaffected.
    let still = tokio::task::spawn_blocking({
        let holder = holder.clone();
        move || holder.request(MsgType::EchoTest, json!("still")).unwrap()
    })
    .await
    .unwrap();
    assert_eq!(still.code, Code::Success);
    server.stop().await;
}
