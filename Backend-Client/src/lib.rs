//! # backend-client
//!
//! UI-process side of a desktop AI shell: finds the locally running
//! generation backend, keeps exactly one live WebSocket connection to it,
//! and folds the real-time streams (relayed logs, backend setup status,
//! update status, per-slot generation progress) into bounded stores.
//!
//! The privileged-process half lives in [`shell_bridge`]; this crate talks
//! to it through [`shell_bridge::BridgeCommands`] and the push channels of
//! a [`shell_bridge::LocalWindow`].
//!
//! ## Quick Start
//!
//! ```no_run
//! use backend_client::{ClientConfig, ConnectionManager, GenerationProgressStore, SocketFactory};
//! use std::sync::{Arc, Mutex};
//!
//! # async fn example() -> backend_client::Result<()> {
//! let config = ClientConfig::default();
//! let manager = ConnectionManager::new(SocketFactory::new(&config.socket_path), config);
//! manager.connect_standalone().await?;
//!
//! let progress = Arc::new(Mutex::new(GenerationProgressStore::new()));
//! progress.lock().unwrap().init_batch(4);
//! let sink = Arc::clone(&progress);
//! let _sub = manager.events().subscribe(move |event| {
//!     sink.lock().unwrap().apply(event);
//! });
//!
//! let health = manager.http_client().health().await?;
//! println!("backend: {}", health.status);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod connection;
pub mod connectivity;
pub mod endpoint;
pub mod error;
pub mod generation;
pub mod persist;
pub mod session;
pub mod stores;

pub use client::{BackendClient, HealthResponse};
pub use config::{ClientConfig, ClientConfigBuilder};
pub use connection::{
    event_names, BackendConnection, BackendEvent, ConnectionFactory, SocketConnection,
    SocketFactory,
};
pub use connectivity::ConnectionManager;
pub use endpoint::BackendEndpoint;
pub use error::{ClientError, Result};
pub use generation::{
    FinalItem, GenerationProgressStore, GenerationResponse, HistoryImage, SlotView, StepEnd,
};
pub use persist::{GeneratorFormValues, KeyValueStore, DEFAULTS_APPLIED_KEY, FORM_VALUES_KEY};
pub use session::UiSession;
pub use stores::{
    BackendStatusEntry, LogStore, StatusIndicator, StatusLog, UpdateStatusStore, MAX_LOGS,
    MAX_STATUS,
};
