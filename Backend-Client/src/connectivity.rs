//! Endpoint resolution and ownership of the single live backend connection.

use shell_bridge::{BridgeCommands, Channel};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock, PoisonError, RwLock};
use tokio::sync::{watch, Mutex};

use crate::client::BackendClient;
use crate::config::ClientConfig;
use crate::connection::{BackendConnection, BackendEvent, ConnectionFactory};
use crate::endpoint::BackendEndpoint;
use crate::error::Result;

/// Owns the current backend connection and the event channel every
/// connection publishes on.
///
/// A default-bound connection exists from construction. Resolving the
/// endpoint either connects it, or replaces it with one bound to the port
/// the privileged process reports. Consumers subscribe to [`events()`]
/// once and keep receiving across replacement.
///
/// [`events()`]: ConnectionManager::events
pub struct ConnectionManager<F: ConnectionFactory> {
    factory: F,
    config: ClientConfig,
    events: Channel<BackendEvent>,
    current: RwLock<Arc<F::Connection>>,
    created: AtomicUsize,
    endpoint: OnceLock<BackendEndpoint>,
    resolving: Mutex<()>,
    initialized: watch::Sender<bool>,
}

impl<F: ConnectionFactory> ConnectionManager<F> {
    pub fn new(factory: F, config: ClientConfig) -> Self {
        let events = Channel::new();
        let default_endpoint = BackendEndpoint::new(config.host.clone(), config.default_port);
        let initial = factory.create(default_endpoint, events.clone());
        let (initialized, _) = watch::channel(false);
        Self {
            factory,
            config,
            events,
            current: RwLock::new(Arc::new(initial)),
            created: AtomicUsize::new(1),
            endpoint: OnceLock::new(),
            resolving: Mutex::new(()),
            initialized,
        }
    }

    /// Resolve the backend endpoint and bring the connection up.
    ///
    /// Inside the privileged host (`bridge` is `Some`) the port is queried
    /// from it, bounded by [`ClientConfig::port_query_timeout`]; a failed or
    /// timed-out query falls back to the default port. Initialisation is
    /// signalled exactly once whichever way this goes, including when the
    /// connect itself fails. Later calls return the already-resolved
    /// endpoint without touching the connection.
    pub async fn resolve_and_connect<B: BridgeCommands>(
        &self,
        bridge: Option<&B>,
    ) -> Result<BackendEndpoint> {
        self.establish(async {
            match bridge {
                Some(bridge) => self.query_port(bridge).await,
                None => self.config.default_port,
            }
        })
        .await
    }

    /// [`resolve_and_connect`](Self::resolve_and_connect) for a UI running
    /// outside the privileged host.
    pub async fn connect_standalone(&self) -> Result<BackendEndpoint> {
        self.establish(std::future::ready(self.config.default_port))
            .await
    }

    async fn establish(&self, port: impl Future<Output = u16>) -> Result<BackendEndpoint> {
        let _guard = self.resolving.lock().await;
        if let Some(endpoint) = self.endpoint.get() {
            return Ok(endpoint.clone());
        }

        let endpoint = BackendEndpoint::new(self.config.host.clone(), port.await);
        let connected = self.bind(&endpoint).await;

        let _ = self.endpoint.set(endpoint.clone());
        self.initialized.send_replace(true);
        tracing::info!("Backend endpoint resolved to {}", endpoint);

        if let Err(e) = &connected {
            tracing::warn!("Backend connection failed: {}", e);
        }
        connected.map(|_| endpoint)
    }

    async fn query_port<B: BridgeCommands>(&self, bridge: &B) -> u16 {
        let fallback = self.config.default_port;
        match tokio::time::timeout(self.config.port_query_timeout, bridge.backend_port()).await {
            Ok(Ok(port)) => port,
            Ok(Err(e)) => {
                tracing::warn!("Backend port query failed, using {}: {}", fallback, e);
                fallback
            }
            Err(_) => {
                tracing::warn!(
                    "Backend port query timed out after {:?}, using {}",
                    self.config.port_query_timeout,
                    fallback
                );
                fallback
            }
        }
    }

    async fn bind(&self, endpoint: &BackendEndpoint) -> Result<()> {
        if endpoint.port == self.config.default_port {
            return self.current().connect().await;
        }

        let fresh = Arc::new(self.factory.create(endpoint.clone(), self.events.clone()));
        self.created.fetch_add(1, Ordering::SeqCst);
        // Install before connecting so nothing in flight is attributed to the old one.
        let previous = {
            let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *current, Arc::clone(&fresh))
        };
        previous.disconnect();
        tracing::debug!(
            "Replaced backend connection {} with {}",
            previous.endpoint(),
            endpoint
        );
        fresh.connect().await
    }

    /// Disconnect and connect the current connection again.
    pub async fn reconnect(&self) -> Result<()> {
        let current = self.current();
        current.disconnect();
        current.connect().await
    }

    /// Wait until the first resolution has finished.
    pub async fn wait_initialized(&self) {
        let mut rx = self.initialized.subscribe();
        let _ = rx.wait_for(|done| *done).await;
    }

    pub fn is_initialized(&self) -> bool {
        *self.initialized.borrow()
    }

    /// The resolved endpoint, once resolution has run.
    pub fn endpoint(&self) -> Option<&BackendEndpoint> {
        self.endpoint.get()
    }

    pub fn current(&self) -> Arc<F::Connection> {
        let current = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&current)
    }

    /// Events from whichever connection is current.
    pub fn events(&self) -> &Channel<BackendEvent> {
        &self.events
    }

    /// Connections built so far, the default-bound one included.
    pub fn connections_created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    /// An HTTP client bound to the resolved endpoint, or to the default one
    /// before resolution.
    pub fn http_client(&self) -> BackendClient {
        let endpoint = self
            .endpoint()
            .cloned()
            .unwrap_or_else(|| BackendEndpoint::new(self.config.host.clone(), self.config.default_port));
        BackendClient::new(endpoint.base_url())
    }
}
