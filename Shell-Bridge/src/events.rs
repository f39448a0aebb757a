use serde::{Deserialize, Serialize};
use std::fmt;

/// Push channels carried from the privileged process to every live window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PushChannel {
    Log,
    BackendStatus,
    UpdateStatus,
}

impl PushChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            PushChannel::Log => "log",
            PushChannel::BackendStatus => "backend-status",
            PushChannel::UpdateStatus => "update-status",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "log" => Some(PushChannel::Log),
            "backend-status" => Some(PushChannel::BackendStatus),
            "update-status" => Some(PushChannel::UpdateStatus),
            _ => None,
        }
    }
}

impl fmt::Display for PushChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request/response command names (UI -> privileged).
pub mod commands {
    pub const START_LOG_STREAM: &str = "backend:start-log-stream";
    pub const STOP_LOG_STREAM: &str = "backend:stop-log-stream";
    pub const LOG_STREAM_STATUS: &str = "backend:log-stream-status";
    pub const GET_PORT: &str = "backend:get-port";
    pub const GET_STATUS_HISTORY: &str = "backend-setup:get-history";
    pub const UPDATER_CHECK: &str = "updater:check";
    pub const UPDATER_DOWNLOAD: &str = "updater:download";
    pub const UPDATER_INSTALL: &str = "updater:install";
    pub const UPDATER_GET_INFO: &str = "updater:get-info";
}

/// Severity of a relayed log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Log,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Log => "log",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// One line of process output, stamped when it was emitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

impl LogEntry {
    /// Create an entry stamped with the current time.
    pub fn now(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendStatusLevel {
    Info,
    Error,
}

/// A remediation suggestion attached to a status message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCommand {
    pub label: String,
    pub command: String,
}

/// A backend-lifecycle status message as sent by the privileged process.
///
/// The receiving store assigns the id and timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendStatusPayload {
    pub level: BackendStatusLevel,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commands: Option<Vec<StatusCommand>>,
}

impl BackendStatusPayload {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: BackendStatusLevel::Info,
            message: message.into(),
            commands: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: BackendStatusLevel::Error,
            message: message.into(),
            commands: None,
        }
    }

    /// Attach a suggested command (builder pattern).
    pub fn with_command(mut self, label: impl Into<String>, command: impl Into<String>) -> Self {
        self.commands.get_or_insert_with(Vec::new).push(StatusCommand {
            label: label.into(),
            command: command.into(),
        });
        self
    }
}

/// Snapshot of the software-update lifecycle.
///
/// Published wholesale on every transition; consumers replace their copy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatus {
    pub update_available: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downloading: Option<bool>,
    /// Download progress in percent (0..=100).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_channel_names() {
        for channel in [
            PushChannel::Log,
            PushChannel::BackendStatus,
            PushChannel::UpdateStatus,
        ] {
            assert_eq!(PushChannel::parse(channel.as_str()), Some(channel));
        }
        assert_eq!(PushChannel::parse("nope"), None);
    }

    #[test]
    fn test_update_status_wire_format() {
        let status = UpdateStatus {
            update_available: true,
            version: Some("1.4.0".into()),
            downloading: Some(true),
            progress: Some(42.0),
            error: None,
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["updateAvailable"], true);
        assert_eq!(json["version"], "1.4.0");
        assert_eq!(json["progress"], 42.0);
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_status_payload_without_commands() {
        let payload: BackendStatusPayload =
            serde_json::from_str(r#"{"level":"info","message":"Installing uv"}"#).unwrap();
        assert_eq!(payload, BackendStatusPayload::info("Installing uv"));
    }

    #[test]
    fn test_status_payload_with_commands() {
        let payload = BackendStatusPayload::error("Python 3.11 not found")
            .with_command("Install with winget", "winget install Python.Python.3.11");
        let json = serde_json::to_string(&payload).unwrap();
        assert!(json.contains("\"level\":\"error\""));
        assert!(json.contains("\"label\":\"Install with winget\""));
    }

    #[test]
    fn test_log_level_wire_names() {
        let entry = LogEntry {
            level: LogLevel::Warn,
            message: "low disk".into(),
            timestamp: 1,
        };
        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("\"level\":\"warn\""));
    }
}
