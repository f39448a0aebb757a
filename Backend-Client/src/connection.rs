//! The duplex connection from a UI process to the backend.

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shell_bridge::Channel;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::endpoint::BackendEndpoint;
use crate::error::{ClientError, Result};

/// Event names the backend streams over the connection.
pub mod event_names {
    pub const DOWNLOAD_START: &str = "download_start";
    pub const DOWNLOAD_STEP_PROGRESS: &str = "download_step_progress";
    pub const DOWNLOAD_COMPLETED: &str = "download_completed";
    pub const MODEL_LOAD_STARTED: &str = "model_load_started";
    pub const MODEL_LOAD_PROGRESS: &str = "model_load_progress";
    pub const MODEL_LOAD_COMPLETED: &str = "model_load_completed";
    pub const GENERATION_PHASE: &str = "generation_phase";
    pub const IMAGE_GENERATION_STEP_END: &str = "image_generation_step_end";
}

/// A backend event: `{"type": <name>, "data": <json>}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: Value,
}

impl BackendEvent {
    pub fn new(kind: impl Into<String>, data: Value) -> Self {
        Self {
            kind: kind.into(),
            data,
        }
    }

    pub fn is(&self, kind: &str) -> bool {
        self.kind == kind
    }

    /// Decode the payload as `T`.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.data.clone())?)
    }
}

/// A live duplex channel to the backend.
///
/// Incoming events are published on the channel handed to the
/// [`ConnectionFactory`]. After [`disconnect()`](Self::disconnect) an
/// instance never publishes again.
pub trait BackendConnection: Send + Sync + 'static {
    fn endpoint(&self) -> &BackendEndpoint;

    fn connect(&self) -> impl Future<Output = Result<()>> + Send;

    fn disconnect(&self);

    fn is_connected(&self) -> bool;

    fn send(&self, event: &BackendEvent) -> impl Future<Output = Result<()>> + Send;
}

/// Builds connections bound to an endpoint.
pub trait ConnectionFactory: Send + Sync + 'static {
    type Connection: BackendConnection;

    fn create(&self, endpoint: BackendEndpoint, events: Channel<BackendEvent>) -> Self::Connection;
}

type SocketSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// Where a connection's reader publishes. Closing waits for an in-flight
/// publish to finish; nothing is published afterwards.
///
/// Subscribers must not close the outlet they are being called from.
#[derive(Clone, Default)]
struct Outlet(Arc<Mutex<Option<Channel<BackendEvent>>>>);

impl Outlet {
    fn open(&self, events: Channel<BackendEvent>) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = Some(events);
    }

    fn close(&self) {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).take();
    }

    /// Returns `false` once closed.
    fn publish(&self, event: BackendEvent) -> bool {
        match self.0.lock().unwrap_or_else(PoisonError::into_inner).as_ref() {
            Some(events) => {
                events.publish(event);
                true
            }
            None => false,
        }
    }
}

/// WebSocket connection to the backend.
pub struct SocketConnection {
    endpoint: BackendEndpoint,
    url: String,
    events: Channel<BackendEvent>,
    outlet: Outlet,
    live: Arc<AtomicBool>,
    writer: tokio::sync::Mutex<Option<SocketSink>>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl SocketConnection {
    pub fn new(endpoint: BackendEndpoint, socket_path: &str, events: Channel<BackendEvent>) -> Self {
        let url = endpoint.socket_url(socket_path);
        Self {
            endpoint,
            url,
            events,
            outlet: Outlet::default(),
            live: Arc::new(AtomicBool::new(false)),
            writer: tokio::sync::Mutex::new(None),
            reader: Mutex::new(None),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn stop_reader(&self) {
        if let Some(handle) = self.reader.lock().ok().and_then(|mut r| r.take()) {
            handle.abort();
        }
    }
}

impl BackendConnection for SocketConnection {
    fn endpoint(&self) -> &BackendEndpoint {
        &self.endpoint
    }

    async fn connect(&self) -> Result<()> {
        if self.is_connected() {
            return Ok(());
        }
        self.stop_reader();

        let (socket, _) = tokio_tungstenite::connect_async(self.url.as_str())
            .await
            .map_err(|e| ClientError::Socket {
                context: format!("Cannot connect to backend at {}, is it running?", self.url),
                source: e,
            })?;
        let (sink, mut stream) = socket.split();
        *self.writer.lock().await = Some(sink);
        self.outlet.open(self.events.clone());
        self.live.store(true, Ordering::SeqCst);
        tracing::info!("Connected to backend at {}", self.url);

        let live = Arc::clone(&self.live);
        let outlet = self.outlet.clone();
        let handle = tokio::spawn(async move {
            while let Some(msg) = stream.next().await {
                let text = match msg {
                    Ok(m) if m.is_text() => m.into_text().unwrap_or_default(),
                    Ok(m) if m.is_close() => break,
                    Ok(_) => continue,
                    Err(e) => {
                        tracing::warn!("Backend socket error: {}", e);
                        break;
                    }
                };
                match serde_json::from_str::<BackendEvent>(&text) {
                    Ok(event) => {
                        if !outlet.publish(event) {
                            break;
                        }
                    }
                    Err(e) => tracing::debug!("Ignoring malformed backend event: {}", e),
                }
            }
            live.store(false, Ordering::SeqCst);
        });
        if let Ok(mut reader) = self.reader.lock() {
            *reader = Some(handle);
        }
        Ok(())
    }

    fn disconnect(&self) {
        self.outlet.close();
        self.live.store(false, Ordering::SeqCst);
        self.stop_reader();
        // Dropping both halves closes the socket.
        if let Ok(mut writer) = self.writer.try_lock() {
            writer.take();
        }
    }

    fn is_connected(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    async fn send(&self, event: &BackendEvent) -> Result<()> {
        let text = serde_json::to_string(event)?;
        let mut writer = self.writer.lock().await;
        let sink = writer.as_mut().ok_or(ClientError::NotConnected)?;
        sink.send(Message::Text(text))
            .await
            .map_err(|e| ClientError::Socket {
                context: format!("Failed to send {} to backend", event.kind),
                source: e,
            })
    }
}

impl Drop for SocketConnection {
    fn drop(&mut self) {
        self.outlet.close();
        self.stop_reader();
    }
}

/// Creates [`SocketConnection`]s on the configured socket path.
#[derive(Debug, Clone)]
pub struct SocketFactory {
    socket_path: String,
}

impl SocketFactory {
    pub fn new(socket_path: impl Into<String>) -> Self {
        Self {
            socket_path: socket_path.into(),
        }
    }
}

impl ConnectionFactory for SocketFactory {
    type Connection = SocketConnection;

    fn create(&self, endpoint: BackendEndpoint, events: Channel<BackendEvent>) -> SocketConnection {
        SocketConnection::new(endpoint, &self.socket_path, events)
    }
}
