//! Server configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the signaling server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Interval between server-initiated Ping frames, in seconds.
    pub ping_interval_secs: u64,
    /// A silent connection is declared disconnected after this many seconds.
    pub ping_timeout_secs: u64,
    /// Max WebSocket message size in bytes. Signaling frames are small;
    /// anything larger than an SDP blob is a client bug.
    pub max_message_size: usize,
    /// Directory of browser assets to serve, if any.
    pub static_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            ping_interval_secs: 25,
            ping_timeout_secs: 60,
            max_message_size: 64 * 1024, // 64 KB
            static_dir: None,
        }
    }
}

impl ServerConfig {
    /// Ping interval as a [`Duration`].
    #[must_use]
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }

    /// Ping timeout as a [`Duration`].
    #[must_use]
    pub fn ping_timeout(&self) -> Duration {
        Duration::from_secs(self.ping_timeout_secs)
    }
}
