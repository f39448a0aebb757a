//! # Shell Bridge
//!
//! The privileged-process half of a desktop AI shell built on Tauri.
//!
//! ## Features
//!
//! - Push channels from the privileged process to every open window
//!   (`log`, `backend-status`, `update-status`)
//! - Request/response bridge commands ([`BridgeCommands`])
//! - Toggleable log streaming to the UI via a `tracing` layer
//! - Bounded backend setup status history for late-opening windows
//! - Software-update lifecycle with progress and a restart prompt
//! - Single-instance lock and exit policy (feature `tauri`)
//!
//! ## Quick Start
//!
//! 1. Build a [`ShellConfig`]
//! 2. Register the plugin with `tauri_app::builder(config)`, or wire a
//!    [`ShellHost`] over your own [`PushTransport`]
//! 3. Report backend setup through [`StatusBroadcaster::emitter()`]
//!
//! Without the `tauri` feature everything except [`tauri_app`] is available,
//! and [`WindowRegistry`] serves as an in-process transport.
//!
//! See the `examples/` directory for complete usage examples.

pub mod bridge;
pub mod channel;
pub mod config;
pub mod error;
pub mod events;
pub mod history;
pub mod host;
pub mod relay;
pub mod status;
#[cfg(feature = "tauri")]
pub mod tauri_app;
pub mod updater;

pub use bridge::{Bridge, LocalWindow, PushTransport, WindowRegistry};
pub use channel::{Channel, Subscription};
pub use config::{ShellConfig, ShellConfigBuilder, DEFAULT_BACKEND_PORT, MAX_STATUS_HISTORY};
pub use error::{BridgeError, UpdateError};
pub use events::{
    commands, BackendStatusLevel, BackendStatusPayload, LogEntry, LogLevel, PushChannel,
    StatusCommand, UpdateStatus,
};
pub use history::BoundedLog;
pub use host::{BridgeCommands, ShellHost};
pub use relay::{init_logging, LogRelay, RelayLayer, Sink, TeeSink};
pub use status::StatusBroadcaster;
pub use updater::{InstallPrompt, UpdateInfo, UpdatePhase, UpdateSource, Updater};
