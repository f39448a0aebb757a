use crate::bridge::Bridge;
use crate::events::{BackendStatusLevel, BackendStatusPayload, PushChannel};
use crate::history::BoundedLog;
use std::sync::{Arc, Mutex};

/// Publishes backend setup status to the UI and keeps a bounded history
/// so windows that open late can replay what they missed.
pub struct StatusBroadcaster {
    history: Mutex<BoundedLog<BackendStatusPayload>>,
    bridge: Arc<Bridge>,
}

impl StatusBroadcaster {
    pub fn new(bridge: Arc<Bridge>, capacity: usize) -> Self {
        Self {
            history: Mutex::new(BoundedLog::new(capacity)),
            bridge,
        }
    }

    /// Record `payload`, log it, and push it on `backend-status`.
    pub fn broadcast(&self, payload: BackendStatusPayload) {
        if let Ok(mut history) = self.history.lock() {
            history.push(payload.clone());
        }

        match payload.level {
            BackendStatusLevel::Error => {
                tracing::error!("[Backend Setup][Error] {}", payload.message)
            }
            BackendStatusLevel::Info => tracing::info!("[Backend Setup][Info] {}", payload.message),
        }

        let _ = self.bridge.push(PushChannel::BackendStatus, &payload);
    }

    /// Everything broadcast so far, oldest first.
    pub fn history(&self) -> Vec<BackendStatusPayload> {
        self.history.lock().map(|h| h.to_vec()).unwrap_or_default()
    }

    /// An emitter closure for the backend launcher to report progress with.
    pub fn emitter(self: &Arc<Self>) -> impl Fn(BackendStatusPayload) + Send + Sync + 'static {
        let this = Arc::clone(self);
        move |payload| this.broadcast(payload)
    }
}
