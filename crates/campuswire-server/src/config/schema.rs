use serde::Deserialize;

use campuswire_core::error::{Result, WireError};
use campuswire_core::frame::DEFAULT_MAX_FRAME_BYTES;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    pub version: u32,

    #[serde(default)]
    pub server: ServerSection,
}

impl ServerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(WireError::BadRequest(format!(
                "unsupported config version: {}",
                self.version
            )));
        }
        self.server.validate()?;
        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            version: 1,
            server: ServerSection::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Upper bound on simultaneously served connections; sockets accepted
    /// beyond it are closed without a frame.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,

    /// Connections silent for longer than this are closed. 0 disables the
    /// deadline.
    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,

    /// How long `stop()` waits for live connections before aborting them.
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,

    /// Capacity of each connection's outbound queue.
    #[serde(default = "default_outbound_queue")]
    pub outbound_queue: usize,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            max_connections: default_max_connections(),
            max_frame_bytes: default_max_frame_bytes(),
            idle_timeout_ms: default_idle_timeout_ms(),
            shutdown_grace_ms: default_shutdown_grace_ms(),
            outbound_queue: default_outbound_queue(),
        }
    }
}

impl ServerSection {
    pub fn validate(&self) -> Result<()> {
        if !(1..=4096).contains(&self.max_connections) {
            return Err(WireError::BadRequest(
                "server.max_connections must be between 1 and 4096".into(),
            ));
        }
        if !(1024..=8 * 1024 * 1024).contains(&self.max_frame_bytes) {
            return Err(WireError::BadRequest(
                "server.max_frame_bytes must be between 1024 and 8388608".into(),
            ));
        }
        if self.idle_timeout_ms != 0 && !(10_000..=600_000).contains(&self.idle_timeout_ms) {
            return Err(WireError::BadRequest(
                "server.idle_timeout_ms must be 0 or between 10000 and 600000".into(),
            ));
        }
        if !(100..=60_000).contains(&self.shutdown_grace_ms) {
            return Err(WireError::BadRequest(
                "server.shutdown_grace_ms must be between 100 and 60000".into(),
            ));
        }
        if !(8..=4096).contains(&self.outbound_queue) {
            return Err(WireError::BadRequest(
                "server.outbound_queue must be between 8 and 4096".into(),
            ));
        }
        Ok(())
    }
}

fn default_listen() -> String {
    "0.0.0.0:8808".into()
}
fn default_max_connections() -> usize {
    64
}
fn default_max_frame_bytes() -> usize {
    DEFAULT_MAX_FRAME_BYTES
}
fn default_idle_timeout_ms() -> u64 {
    300_000
}
fn default_shutdown_grace_ms() -> u64 {
    5000
}
fn default_outbound_queue() -> usize {
    64
}
