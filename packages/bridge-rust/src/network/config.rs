//! Configuration for the shared reply listener.

use std::time::Duration;

/// Port the external utility is told to call back on unless configured otherwise.
pub const DEFAULT_REPLY_PORT: u16 = 9999;

/// Shared reply listener configuration.
#[derive(Debug, Clone)]
pub struct ListenerConfig {
    /// Bind address for the listener.
    pub host: String,
    /// Port to listen on. 0 means OS-assigned.
    pub port: u16,
    /// Per-connection settings.
    pub connection: ConnectionConfig,
}

impl ListenerConfig {
    /// `host:port` string handed to the socket bind call.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_REPLY_PORT,
            connection: ConnectionConfig::default(),
        }
    }
}

/// Limits applied to each accepted reply connection.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Largest reply document accepted, in bytes.
    pub max_message_bytes: usize,
    /// Maximum time a peer may take to deliver its complete reply.
    pub read_timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            max_message_bytes: 65_536, // 64 KB
            read_timeout: Duration::from_secs(10),
        }
    }
}
