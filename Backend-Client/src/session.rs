//! A UI window's view of the privileged process and the backend.
//!
//! [`UiSession::attach`] subscribes the window's stores to the push
//! channels, replays the backend status history and pulls the current log
//! streaming flag and update status. [`UiSession::detach`] undoes it.

use shell_bridge::{
    BackendStatusPayload, BridgeCommands, LocalWindow, LogEntry, PushChannel, Subscription,
    UpdateStatus,
};
use std::sync::{Arc, Mutex, PoisonError};

use crate::config::ClientConfig;
use crate::connection::ConnectionFactory;
use crate::connectivity::ConnectionManager;
use crate::error::Result;
use crate::generation::GenerationProgressStore;
use crate::stores::{BackendStatusEntry, LogStore, StatusLog, UpdateStatusStore};

fn locked<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Live status payloads held back until the history replay is done.
type Pending = Arc<Mutex<Option<Vec<BackendStatusPayload>>>>;

/// Length of the longest suffix of `history` that `live` starts with.
fn overlap(history: &[BackendStatusPayload], live: &[BackendStatusPayload]) -> usize {
    (1..=history.len().min(live.len()))
        .rev()
        .find(|&k| history[history.len() - k..] == live[..k])
        .unwrap_or(0)
}

pub struct UiSession {
    logs: Arc<Mutex<LogStore>>,
    status: Arc<Mutex<StatusLog>>,
    update: Arc<Mutex<UpdateStatusStore>>,
    subscriptions: Vec<Subscription>,
}

impl UiSession {
    /// Bind a session to `window`, using `bridge` for the initial queries.
    ///
    /// Channels are subscribed before the status history is fetched, so a
    /// status sent while the fetch is in flight is kept and lands after the
    /// replayed history. A failed history fetch leaves the log to the live
    /// stream.
    pub async fn attach<B: BridgeCommands>(
        config: &ClientConfig,
        window: &LocalWindow,
        bridge: &B,
    ) -> Result<Self> {
        let mut session = Self {
            logs: Arc::new(Mutex::new(LogStore::new(config.max_logs))),
            status: Arc::new(Mutex::new(StatusLog::new(config.max_status))),
            update: Arc::new(Mutex::new(UpdateStatusStore::default())),
            subscriptions: Vec::new(),
        };

        let logs = Arc::clone(&session.logs);
        session.subscriptions.push(window.on(PushChannel::Log, move |entry: LogEntry| {
            locked(&logs).push(entry);
        }));

        let pending: Pending = Arc::new(Mutex::new(Some(Vec::new())));
        let status = Arc::clone(&session.status);
        let early = Arc::clone(&pending);
        session.subscriptions.push(window.on(
            PushChannel::BackendStatus,
            move |payload: BackendStatusPayload| match locked(&early).as_mut() {
                Some(held) => held.push(payload),
                None => {
                    locked(&status).add_entry(payload);
                }
            },
        ));

        let update = Arc::clone(&session.update);
        session.subscriptions.push(window.on(
            PushChannel::UpdateStatus,
            move |next: UpdateStatus| locked(&update).replace(next),
        ));

        let history = bridge.backend_status_history().await.unwrap_or_else(|e| {
            tracing::warn!("Backend status history unavailable: {}", e);
            Vec::new()
        });
        {
            // Lock order matches the subscriber: pending, then status.
            let mut pending = locked(&pending);
            let held = pending.take().unwrap_or_default();
            let skip = overlap(&history, &held);
            let mut status = locked(&session.status);
            for payload in history.into_iter().chain(held.into_iter().skip(skip)) {
                status.add_entry(payload);
            }
        }

        let streaming = bridge.log_stream_status().await?;
        locked(&session.logs).set_streaming(streaming);
        let current = bridge.update_info().await?;
        locked(&session.update).replace(current);

        tracing::debug!(window = window.label(), "UI session attached");
        Ok(session)
    }

    pub async fn start_log_stream<B: BridgeCommands>(&self, bridge: &B) -> Result<()> {
        bridge.start_log_stream().await?;
        locked(&self.logs).set_streaming(true);
        Ok(())
    }

    pub async fn stop_log_stream<B: BridgeCommands>(&self, bridge: &B) -> Result<()> {
        bridge.stop_log_stream().await?;
        locked(&self.logs).set_streaming(false);
        Ok(())
    }

    /// Feed backend events from `manager` into `store` for as long as the
    /// session is attached.
    pub fn bind_generation<F: ConnectionFactory>(
        &mut self,
        manager: &ConnectionManager<F>,
        store: Arc<Mutex<GenerationProgressStore>>,
    ) {
        let sub = manager.events().subscribe(move |event| {
            locked(&store).apply(event);
        });
        self.subscriptions.push(sub);
    }

    pub fn log_entries(&self) -> Vec<LogEntry> {
        locked(&self.logs).entries()
    }

    pub fn clear_logs(&self) {
        locked(&self.logs).clear();
    }

    pub fn is_streaming(&self) -> bool {
        locked(&self.logs).is_streaming()
    }

    pub fn status_entries(&self) -> Vec<BackendStatusEntry> {
        locked(&self.status).entries()
    }

    pub fn status_log(&self) -> &Arc<Mutex<StatusLog>> {
        &self.status
    }

    pub fn update_status(&self) -> UpdateStatus {
        locked(&self.update).current().clone()
    }

    /// Unsubscribe everything and clear the status log.
    pub fn detach(mut self) {
        for sub in self.subscriptions.drain(..) {
            sub.unsubscribe();
        }
        locked(&self.status).clear();
        tracing::debug!("UI session detached");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payloads(messages: &[&str]) -> Vec<BackendStatusPayload> {
        messages.iter().map(|m| BackendStatusPayload::info(*m)).collect()
    }

    #[test]
    fn test_overlap_between_history_and_live() {
        let history = payloads(&["a", "b", "c"]);
        assert_eq!(overlap(&history, &payloads(&[])), 0);
        assert_eq!(overlap(&history, &payloads(&["d"])), 0);
        assert_eq!(overlap(&history, &payloads(&["c", "d"])), 1);
        assert_eq!(overlap(&history, &payloads(&["b", "c", "d"])), 2);
        assert_eq!(overlap(&[], &payloads(&["a"])), 0);
    }
}
