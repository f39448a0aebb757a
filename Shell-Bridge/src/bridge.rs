//! Push side of the process bridge.
//!
//! A [`Bridge`] serializes a payload once and hands it to a
//! [`PushTransport`], which fans it out to every live UI window. Delivery is
//! fire-and-forget: windows that were torn down are skipped, never an error.
//!
//! Nothing in this module may emit `tracing` events at info level or above
//! from the push path: the log relay pushes through here.

use crate::channel::{Channel, Subscription};
use crate::error::BridgeError;
use crate::events::PushChannel;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Something that can deliver a push message to all live windows.
pub trait PushTransport: Send + Sync {
    /// Deliver `payload` on `channel` to every live window.
    /// Returns how many windows received it.
    fn broadcast(&self, channel: PushChannel, payload: &Value) -> usize;
}

/// Privileged-process handle for pushing events to the UI.
pub struct Bridge {
    transport: Box<dyn PushTransport>,
}

impl Bridge {
    pub fn new(transport: impl PushTransport + 'static) -> Self {
        Self {
            transport: Box::new(transport),
        }
    }

    /// Serialize and fan out `payload`. Returns the number of windows reached.
    pub fn push<T: Serialize>(&self, channel: PushChannel, payload: &T) -> Result<usize, BridgeError> {
        let value = serde_json::to_value(payload)?;
        Ok(self.transport.broadcast(channel, &value))
    }
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge").finish_non_exhaustive()
    }
}

/// An in-process UI window: one [`Channel`] per push channel.
///
/// Used when the privileged and UI sides share a process, and as the test
/// double for real webview windows.
pub struct LocalWindow {
    label: String,
    destroyed: AtomicBool,
    channels: Mutex<HashMap<PushChannel, Channel<Value>>>,
}

impl LocalWindow {
    fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            destroyed: AtomicBool::new(false),
            channels: Mutex::new(HashMap::new()),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Tear the window down. Later pushes skip it.
    pub fn destroy(&self) {
        self.destroyed.store(true, Ordering::SeqCst);
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    fn channel(&self, channel: PushChannel) -> Option<Channel<Value>> {
        let mut map = self.channels.lock().ok()?;
        Some(map.entry(channel).or_default().clone())
    }

    /// Listen for raw JSON payloads on `channel`.
    pub fn listen<F>(&self, channel: PushChannel, handler: F) -> Subscription
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        match self.channel(channel) {
            Some(ch) => ch.subscribe(handler),
            None => Subscription::new(|| {}),
        }
    }

    /// Listen for typed payloads on `channel`. Payloads that do not
    /// deserialize as `T` are dropped.
    pub fn on<T, F>(&self, channel: PushChannel, handler: F) -> Subscription
    where
        T: DeserializeOwned,
        F: Fn(T) + Send + Sync + 'static,
    {
        self.listen(channel, move |value| match serde_json::from_value::<T>(value.clone()) {
            Ok(payload) => handler(payload),
            Err(e) => tracing::trace!(%channel, "dropping malformed push payload: {}", e),
        })
    }

    fn deliver(&self, channel: PushChannel, payload: &Value) {
        if let Some(ch) = self.channel(channel) {
            ch.publish(payload.clone());
        }
    }
}

/// The set of live in-process windows. Implements [`PushTransport`].
#[derive(Clone, Default)]
pub struct WindowRegistry {
    windows: Arc<Mutex<Vec<Arc<LocalWindow>>>>,
}

impl WindowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new window and register it for push delivery.
    pub fn open(&self, label: impl Into<String>) -> Arc<LocalWindow> {
        let window = Arc::new(LocalWindow::new(label));
        if let Ok(mut windows) = self.windows.lock() {
            windows.push(Arc::clone(&window));
        }
        window
    }

    /// Number of windows that have not been destroyed.
    pub fn live_count(&self) -> usize {
        self.windows
            .lock()
            .map(|w| w.iter().filter(|w| !w.is_destroyed()).count())
            .unwrap_or(0)
    }
}

impl PushTransport for WindowRegistry {
    fn broadcast(&self, channel: PushChannel, payload: &Value) -> usize {
        let live: Vec<Arc<LocalWindow>> = match self.windows.lock() {
            Ok(mut windows) => {
                windows.retain(|w| !w.is_destroyed());
                windows.clone()
            }
            Err(_) => return 0,
        };
        for window in &live {
            window.deliver(channel, payload);
        }
        live.len()
    }
}
