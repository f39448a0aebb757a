use shell_bridge::{DEFAULT_BACKEND_PORT, MAX_STATUS_HISTORY};
use std::path::PathBuf;
use std::time::Duration;

use crate::stores::MAX_LOGS;

/// Configuration for a UI process.
///
/// Use [`ClientConfig::builder()`] for ergonomic construction.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Host the backend listens on.
    pub host: String,

    /// Port used when no privileged process assigns one.
    pub default_port: u16,

    /// Path of the backend's WebSocket endpoint.
    pub socket_path: String,

    /// How long to wait for the privileged process to report the port
    /// before falling back to `default_port`.
    pub port_query_timeout: Duration,

    /// Capacity of the UI log store.
    pub max_logs: usize,

    /// Capacity of the UI backend status log.
    pub max_status: usize,

    /// JSON file backing persisted snapshots. `None` keeps them in memory.
    pub storage_path: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            default_port: DEFAULT_BACKEND_PORT,
            socket_path: "/ws".to_string(),
            port_query_timeout: Duration::from_secs(10),
            max_logs: MAX_LOGS,
            max_status: MAX_STATUS_HISTORY,
            storage_path: None,
        }
    }
}

impl ClientConfig {
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }
}

/// Builder for [`ClientConfig`].
#[derive(Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    pub fn with_default_port(mut self, port: u16) -> Self {
        self.config.default_port = port;
        self
    }

    pub fn with_socket_path(mut self, path: impl Into<String>) -> Self {
        self.config.socket_path = path.into();
        self
    }

    pub fn with_port_query_timeout(mut self, timeout: Duration) -> Self {
        self.config.port_query_timeout = timeout;
        self
    }

    pub fn with_max_logs(mut self, max: usize) -> Self {
        self.config.max_logs = max;
        self
    }

    pub fn with_max_status(mut self, max: usize) -> Self {
        self.config.max_status = max;
        self
    }

    pub fn with_storage_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.storage_path = Some(path.into());
        self
    }

    pub fn build(self) -> ClientConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.default_port, 8000);
        assert_eq!(config.max_logs, 250);
        assert_eq!(config.max_status, 100);
        assert_eq!(config.port_query_timeout, Duration::from_secs(10));
        assert!(config.storage_path.is_none());
    }

    #[test]
    fn test_builder_overrides() {
        let config = ClientConfig::builder()
            .with_host("127.0.0.1")
            .with_default_port(9000)
            .with_storage_path("/tmp/state.json")
            .build();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.default_port, 9000);
        assert_eq!(config.storage_path, Some(PathBuf::from("/tmp/state.json")));
    }
}
