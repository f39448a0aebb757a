//! Log relay: tees process output onto the `log` push channel.
//!
//! Two producers feed the relay:
//!
//! - `tracing` events, through [`RelayLayer`] stacked next to the regular
//!   `fmt` layer (see [`init_logging`]);
//! - anything written to a [`TeeSink`], which always forwards to its primary
//!   [`Sink`] and additionally to the relay.
//!
//! Enabling or disabling never touches the primary output, so toggling is
//! idempotent and leaves no residue.

use crate::bridge::Bridge;
use crate::error::BridgeError;
use crate::events::{LogEntry, LogLevel, PushChannel};
use std::fmt::{self, Write as _};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Events from the bridge's own push path are never relayed.
const BRIDGE_TARGET: &str = "shell_bridge::bridge";

/// A destination for leveled output lines.
pub trait Sink: Send + Sync {
    fn write(&self, level: LogLevel, message: &str);
}

impl<F> Sink for F
where
    F: Fn(LogLevel, &str) + Send + Sync,
{
    fn write(&self, level: LogLevel, message: &str) {
        self(level, message)
    }
}

/// Process-wide streaming toggle plus the push path for relayed lines.
pub struct LogRelay {
    enabled: AtomicBool,
    bridge: Arc<Bridge>,
}

impl LogRelay {
    /// Create a relay. Streaming starts disabled.
    pub fn new(bridge: Arc<Bridge>) -> Self {
        Self {
            enabled: AtomicBool::new(false),
            bridge,
        }
    }

    /// Start relaying. Returns `false` if it was already enabled.
    pub fn enable(&self) -> bool {
        self.enabled
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Stop relaying. Returns `false` if it was already disabled.
    pub fn disable(&self) -> bool {
        self.enabled
            .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Push `message` as a [`LogEntry`] if streaming is enabled.
    pub fn forward(&self, level: LogLevel, message: &str) {
        if !self.is_enabled() {
            return;
        }
        // Delivery failures are unobservable by contract.
        let _ = self
            .bridge
            .push(PushChannel::Log, &LogEntry::now(level, message));
    }
}

impl Sink for LogRelay {
    fn write(&self, level: LogLevel, message: &str) {
        self.forward(level, message);
    }
}

/// Writes to `primary` unchanged, and to the relay while it is enabled.
pub struct TeeSink<S> {
    primary: S,
    relay: Arc<LogRelay>,
}

impl<S: Sink> TeeSink<S> {
    pub fn new(primary: S, relay: Arc<LogRelay>) -> Self {
        Self { primary, relay }
    }

    pub fn info(&self, message: &str) {
        self.write(LogLevel::Info, message);
    }

    pub fn warn(&self, message: &str) {
        self.write(LogLevel::Warn, message);
    }

    pub fn error(&self, message: &str) {
        self.write(LogLevel::Error, message);
    }

    /// Write the space-joined string forms of `args` at `level`.
    pub fn write_args(&self, level: LogLevel, args: &[&dyn fmt::Display]) {
        self.write(level, &join_args(args));
    }
}

impl<S: Sink> Sink for TeeSink<S> {
    fn write(&self, level: LogLevel, message: &str) {
        self.primary.write(level, message);
        self.relay.forward(level, message);
    }
}

/// Space-join the `Display` forms of `args`.
pub fn join_args(args: &[&dyn fmt::Display]) -> String {
    let mut out = String::new();
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{}", arg);
    }
    out
}

pub fn level_for(level: &Level) -> LogLevel {
    match *level {
        Level::ERROR => LogLevel::Error,
        Level::WARN => LogLevel::Warn,
        Level::INFO => LogLevel::Info,
        _ => LogLevel::Log,
    }
}

/// `tracing` layer that forwards every event to a [`LogRelay`].
pub struct RelayLayer {
    relay: Arc<LogRelay>,
}

impl RelayLayer {
    pub fn new(relay: Arc<LogRelay>) -> Self {
        Self { relay }
    }
}

impl<S: Subscriber> Layer<S> for RelayLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if !self.relay.is_enabled() {
            return;
        }
        let meta = event.metadata();
        if meta.target().starts_with(BRIDGE_TARGET) {
            return;
        }
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        self.relay.forward(level_for(meta.level()), &visitor.finish());
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: Option<String>,
    fields: Vec<String>,
}

impl MessageVisitor {
    fn finish(self) -> String {
        let mut parts = Vec::with_capacity(self.fields.len() + 1);
        if let Some(message) = self.message {
            parts.push(message);
        }
        parts.extend(self.fields);
        parts.join(" ")
    }
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.fields.push(format!("{}={}", field.name(), value));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{:?}", value));
        } else {
            self.fields.push(format!("{}={:?}", field.name(), value));
        }
    }
}

/// Install the global subscriber: `fmt` output filtered by `RUST_LOG`
/// (default `info`), with the relay layered alongside it.
pub fn init_logging(relay: Arc<LogRelay>) -> Result<(), BridgeError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(RelayLayer::new(relay))
        .try_init()
        .map_err(|e| BridgeError::Logging(e.to_string()))
}
