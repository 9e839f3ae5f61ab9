use std::time::Duration;

use serde::{Deserialize, Serialize};

/// TCP port the appliance listens on.
pub const DEFAULT_PORT: u16 = 8055;

/// Connection settings for [`crate::ReconnectingTransport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Host name or IP address of the appliance.
    pub host: String,
    pub port: u16,
    /// Fixed wait between a failure and the next connection attempt.
    pub reconnect_backoff: Duration,
    /// Upper bound on a single connection attempt.
    pub connect_timeout: Duration,
    /// Maximum bytes requested per socket read.
    pub read_chunk_size: usize,
}

impl TransportConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Self::default()
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.reconnect_backoff = backoff;
        self
    }

    /// `host:port` as passed to the socket layer.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: DEFAULT_PORT,
            reconnect_backoff: Duration::from_secs(1),
            connect_timeout: Duration::from_secs(5),
            read_chunk_size: 1024,
        }
    }
}
