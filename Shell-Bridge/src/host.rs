use crate::bridge::{Bridge, PushTransport};
use crate::config::ShellConfig;
use crate::error::BridgeError;
use crate::events::{commands, BackendStatusPayload, UpdateStatus};
use crate::relay::LogRelay;
use crate::status::StatusBroadcaster;
use crate::updater::{InstallPrompt, UpdateSource, Updater};
use std::future::Future;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;

/// Request/response commands a UI process can issue to the privileged
/// process.
///
/// Calls are independent: several may be in flight at once and each
/// resolves on its own.
pub trait BridgeCommands: Send + Sync {
    fn start_log_stream(&self) -> impl Future<Output = Result<(), BridgeError>> + Send;

    fn stop_log_stream(&self) -> impl Future<Output = Result<(), BridgeError>> + Send;

    fn log_stream_status(&self) -> impl Future<Output = Result<bool, BridgeError>> + Send;

    /// Port the backend was started on.
    fn backend_port(&self) -> impl Future<Output = Result<u16, BridgeError>> + Send;

    fn backend_status_history(
        &self,
    ) -> impl Future<Output = Result<Vec<BackendStatusPayload>, BridgeError>> + Send;

    fn check_for_updates(&self) -> impl Future<Output = Result<(), BridgeError>> + Send;

    fn download_update(&self) -> impl Future<Output = Result<(), BridgeError>> + Send;

    fn install_update(&self) -> impl Future<Output = Result<(), BridgeError>> + Send;

    fn update_info(&self) -> impl Future<Output = Result<UpdateStatus, BridgeError>> + Send;
}

/// The privileged-process state: push bridge, log relay, status
/// broadcaster, updater and the backend port.
pub struct ShellHost<S, P> {
    config: ShellConfig,
    bridge: Arc<Bridge>,
    relay: Arc<LogRelay>,
    status: Arc<StatusBroadcaster>,
    updater: Arc<Updater<S, P>>,
    backend_port: AtomicU16,
}

impl<S, P> ShellHost<S, P>
where
    S: UpdateSource,
    P: InstallPrompt,
{
    /// Wire up the host over `transport`.
    ///
    /// Enables log streaming immediately when
    /// [`ShellConfig::stream_logs_on_start`] is set.
    pub fn new(config: ShellConfig, transport: impl PushTransport + 'static, source: S, prompt: P) -> Self {
        let bridge = Arc::new(Bridge::new(transport));
        let relay = Arc::new(LogRelay::new(Arc::clone(&bridge)));
        let status = Arc::new(StatusBroadcaster::new(
            Arc::clone(&bridge),
            config.status_history_capacity,
        ));
        let updater = Arc::new(Updater::new(source, prompt, Arc::clone(&bridge), &config));

        if config.stream_logs_on_start {
            relay.enable();
        }

        Self {
            backend_port: AtomicU16::new(config.default_backend_port),
            config,
            bridge,
            relay,
            status,
            updater,
        }
    }

    pub fn config(&self) -> &ShellConfig {
        &self.config
    }

    pub fn bridge(&self) -> &Arc<Bridge> {
        &self.bridge
    }

    pub fn relay(&self) -> &Arc<LogRelay> {
        &self.relay
    }

    pub fn status(&self) -> &Arc<StatusBroadcaster> {
        &self.status
    }

    pub fn updater(&self) -> &Arc<Updater<S, P>> {
        &self.updater
    }

    /// Record the port the backend launcher bound.
    pub fn set_backend_port(&self, port: u16) {
        tracing::info!("Backend assigned port {}", port);
        self.backend_port.store(port, Ordering::SeqCst);
    }

    pub fn current_backend_port(&self) -> u16 {
        self.backend_port.load(Ordering::SeqCst)
    }
}

impl<S, P> BridgeCommands for ShellHost<S, P>
where
    S: UpdateSource,
    P: InstallPrompt,
{
    async fn start_log_stream(&self) -> Result<(), BridgeError> {
        tracing::debug!(command = commands::START_LOG_STREAM, "bridge command");
        self.relay.enable();
        Ok(())
    }

    async fn stop_log_stream(&self) -> Result<(), BridgeError> {
        tracing::debug!(command = commands::STOP_LOG_STREAM, "bridge command");
        self.relay.disable();
        Ok(())
    }

    async fn log_stream_status(&self) -> Result<bool, BridgeError> {
        Ok(self.relay.is_enabled())
    }

    async fn backend_port(&self) -> Result<u16, BridgeError> {
        Ok(self.current_backend_port())
    }

    async fn backend_status_history(&self) -> Result<Vec<BackendStatusPayload>, BridgeError> {
        Ok(self.status.history())
    }

    async fn check_for_updates(&self) -> Result<(), BridgeError> {
        tracing::debug!(command = commands::UPDATER_CHECK, "bridge command");
        self.updater.check().await?;
        Ok(())
    }

    async fn download_update(&self) -> Result<(), BridgeError> {
        tracing::debug!(command = commands::UPDATER_DOWNLOAD, "bridge command");
        self.updater.download().await?;
        Ok(())
    }

    async fn install_update(&self) -> Result<(), BridgeError> {
        tracing::debug!(command = commands::UPDATER_INSTALL, "bridge command");
        self.updater.install()?;
        Ok(())
    }

    async fn update_info(&self) -> Result<UpdateStatus, BridgeError> {
        Ok(self.updater.status())
    }
}
