//! campuswire server binary.
//!
//! Loads `campuswire.yaml` when present (built-in defaults otherwise), takes
//! an optional listen port as the first argument, registers the built-in
//! services, and serves until a termination signal triggers the graceful
//! stop sequence.

use std::path::Path;
use std::sync::Arc;

use tracing_subscriber::{fmt, EnvFilter};

use campuswire_server::config::{self, ServerConfig};
use campuswire_server::dispatch::Dispatcher;
use campuswire_server::server::Server;
use campuswire_server::services::EchoService;

const CONFIG_PATH: &str = "campuswire.yaml";

#[tokio::main]
async fn main() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let mut cfg = if Path::new(CONFIG_PATH).exists() {
        config::load_from_file(CONFIG_PATH).expect("config load failed")
    } else {
        ServerConfig::default()
    };

    if let Some(arg) = std::env::args().nth(1) {
        let port: u16 = arg.parse().expect("port argument must be a number");
        cfg.server.listen = format!("0.0.0.0:{port}");
    }

    let dispatcher = Arc::new(Dispatcher::new());
    dispatcher.register(Arc::new(EchoService::new()));
    // Domain modules (library, repairs, payments, courses, shop) register
    // their handlers here once linked in.

    let server = Server::bind(cfg, dispatcher).await.expect("bind failed");
    server.start().expect("start failed");

    tokio::signal::ctrl_c().await.expect("signal handler failed");
    tracing::info!("termination signal received");
    server.stop().await;
}
