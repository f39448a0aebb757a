//! UI-side stores fed by the bridge push channels.

use serde::{Deserialize, Serialize};
use shell_bridge::{
    BackendStatusLevel, BackendStatusPayload, BoundedLog, LogEntry, StatusCommand, UpdateStatus,
    MAX_STATUS_HISTORY,
};

/// Capacity of the UI log store.
pub const MAX_LOGS: usize = 250;

/// Capacity of the UI backend status log.
pub const MAX_STATUS: usize = MAX_STATUS_HISTORY;

/// Relayed log lines, newest last, plus the streaming flag as last seen.
#[derive(Debug, Clone)]
pub struct LogStore {
    entries: BoundedLog<LogEntry>,
    streaming: bool,
}

impl Default for LogStore {
    fn default() -> Self {
        Self::new(MAX_LOGS)
    }
}

impl LogStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: BoundedLog::new(capacity),
            streaming: false,
        }
    }

    pub fn push(&mut self, entry: LogEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.to_vec()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    pub fn set_streaming(&mut self, streaming: bool) {
        self.streaming = streaming;
    }
}

/// A backend status message as received by the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendStatusEntry {
    pub id: String,
    pub level: BackendStatusLevel,
    pub message: String,
    /// Receipt time, epoch milliseconds.
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commands: Option<Vec<StatusCommand>>,
}

impl BackendStatusEntry {
    fn from_payload(payload: BackendStatusPayload) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            level: payload.level,
            message: payload.message,
            timestamp: chrono::Utc::now().timestamp_millis(),
            commands: payload.commands,
        }
    }

    fn same_payload(&self, payload: &BackendStatusPayload) -> bool {
        self.level == payload.level
            && self.message == payload.message
            && self.commands == payload.commands
    }
}

/// Indicator shown next to a status entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusIndicator {
    Running,
    Completed,
    None,
}

/// Bounded backend setup status history shown on the setup screen.
#[derive(Debug, Clone)]
pub struct StatusLog {
    entries: BoundedLog<BackendStatusEntry>,
}

impl Default for StatusLog {
    fn default() -> Self {
        Self::new(MAX_STATUS)
    }
}

impl StatusLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: BoundedLog::new(capacity),
        }
    }

    /// Stamp and append `payload`. A payload identical to the current last
    /// entry is dropped and `None` returned.
    pub fn add_entry(&mut self, payload: BackendStatusPayload) -> Option<&BackendStatusEntry> {
        if self
            .entries
            .last()
            .is_some_and(|last| last.same_payload(&payload))
        {
            return None;
        }
        self.entries.push(BackendStatusEntry::from_payload(payload));
        self.entries.last()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn entries(&self) -> Vec<BackendStatusEntry> {
        self.entries.to_vec()
    }

    pub fn get(&self, index: usize) -> Option<&BackendStatusEntry> {
        self.entries.get(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Info entries show "running" while last and "completed" once
    /// superseded. Errors never show either.
    pub fn indicator(&self, index: usize) -> StatusIndicator {
        match self.entries.get(index) {
            Some(entry) if entry.level == BackendStatusLevel::Info => {
                if index + 1 == self.entries.len() {
                    StatusIndicator::Running
                } else {
                    StatusIndicator::Completed
                }
            }
            _ => StatusIndicator::None,
        }
    }
}

/// Local copy of the privileged process' update status, replaced wholesale.
#[derive(Debug, Clone, Default)]
pub struct UpdateStatusStore {
    status: UpdateStatus,
}

impl UpdateStatusStore {
    pub fn replace(&mut self, status: UpdateStatus) {
        self.status = status;
    }

    pub fn current(&self) -> &UpdateStatus {
        &self.status
    }
}
