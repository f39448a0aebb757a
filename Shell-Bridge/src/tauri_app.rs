//! Tauri integration: webview fan-out, updater/dialog adapters, the
//! `shell-bridge` plugin exposing the bridge commands, and process
//! lifecycle (single instance, exit policy).
//!
//! ```ignore
//! fn main() {
//!     shell_bridge::tauri_app::builder(ShellConfig::default())
//!         .build(tauri::generate_context!())
//!         .expect("error while building tauri application")
//!         .run(shell_bridge::tauri_app::handle_run_event);
//! }
//! ```
//!
//! From the webview, commands are invoked as `plugin:shell-bridge|<name>`.

use crate::bridge::PushTransport;
use crate::config::ShellConfig;
use crate::error::{BridgeError, UpdateError};
use crate::events::{BackendStatusPayload, PushChannel, UpdateStatus};
use crate::host::{BridgeCommands, ShellHost};
use crate::relay::init_logging;
use crate::updater::{InstallPrompt, UpdateInfo, UpdateSource};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tauri::plugin::{Builder as PluginBuilder, TauriPlugin};
use tauri::{AppHandle, Emitter, Manager, RunEvent, Runtime, State};
use tauri_plugin_dialog::{DialogExt, MessageDialogButtons, MessageDialogKind};
use tauri_plugin_updater::UpdaterExt;

pub const PLUGIN_NAME: &str = "shell-bridge";

/// The host as managed in Tauri state.
pub type TauriHost<R> = ShellHost<TauriUpdateSource<R>, DialogPrompt<R>>;

/// Fans push messages out to every open webview window.
pub struct TauriTransport<R: Runtime> {
    app: AppHandle<R>,
}

impl<R: Runtime> TauriTransport<R> {
    pub fn new(app: AppHandle<R>) -> Self {
        Self { app }
    }
}

impl<R: Runtime> PushTransport for TauriTransport<R> {
    fn broadcast(&self, channel: PushChannel, payload: &Value) -> usize {
        // `emit` already targets every webview.
        let open = self.app.webview_windows().len();
        if open == 0 {
            return 0;
        }
        match self.app.emit(channel.as_str(), payload) {
            Ok(()) => open,
            Err(e) => {
                tracing::debug!(
                    target: "shell_bridge::bridge",
                    "Failed to emit {}: {}",
                    channel.as_str(),
                    e
                );
                0
            }
        }
    }
}

/// [`UpdateSource`] backed by `tauri-plugin-updater`.
pub struct TauriUpdateSource<R: Runtime> {
    app: AppHandle<R>,
    pending: Mutex<Option<tauri_plugin_updater::Update>>,
    bytes: Mutex<Option<Vec<u8>>>,
}

impl<R: Runtime> TauriUpdateSource<R> {
    pub fn new(app: AppHandle<R>) -> Self {
        Self {
            app,
            pending: Mutex::new(None),
            bytes: Mutex::new(None),
        }
    }

    fn pending(&self) -> Option<tauri_plugin_updater::Update> {
        self.pending.lock().ok().and_then(|p| p.clone())
    }
}

impl<R: Runtime> UpdateSource for TauriUpdateSource<R> {
    fn current_version(&self) -> String {
        self.app.package_info().version.to_string()
    }

    async fn check(&self) -> Result<Option<UpdateInfo>, UpdateError> {
        let updater = self
            .app
            .updater()
            .map_err(|e| UpdateError::Check(e.to_string()))?;
        let update = updater
            .check()
            .await
            .map_err(|e| UpdateError::Check(e.to_string()))?;

        let info = update.as_ref().map(|u| UpdateInfo {
            version: u.version.clone(),
        });
        if let Ok(mut pending) = self.pending.lock() {
            *pending = update;
        }
        Ok(info)
    }

    async fn download<F>(&self, mut on_progress: F) -> Result<(), UpdateError>
    where
        F: FnMut(f64) + Send,
    {
        let update = self.pending().ok_or(UpdateError::NoUpdate)?;
        let mut received: u64 = 0;
        let bytes = update
            .download(
                |chunk, total| {
                    received += chunk as u64;
                    if let Some(total) = total.filter(|t| *t > 0) {
                        on_progress(received as f64 / total as f64 * 100.0);
                    }
                },
                || {},
            )
            .await
            .map_err(|e| UpdateError::Download(e.to_string()))?;

        if let Ok(mut slot) = self.bytes.lock() {
            *slot = Some(bytes);
        }
        Ok(())
    }

    fn install(&self) -> Result<(), UpdateError> {
        let update = self.pending().ok_or(UpdateError::NotDownloaded)?;
        let bytes = self
            .bytes
            .lock()
            .ok()
            .and_then(|mut b| b.take())
            .ok_or(UpdateError::NotDownloaded)?;
        update
            .install(bytes)
            .map_err(|e| UpdateError::Install(e.to_string()))?;
        self.app.restart()
    }
}

/// Native "Restart / Later" dialog.
pub struct DialogPrompt<R: Runtime> {
    app: AppHandle<R>,
}

impl<R: Runtime> DialogPrompt<R> {
    pub fn new(app: AppHandle<R>) -> Self {
        Self { app }
    }
}

impl<R: Runtime> InstallPrompt for DialogPrompt<R> {
    async fn confirm_restart(&self, version: &str) -> bool {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.app
            .dialog()
            .message(format!(
                "A new version ({version}) has been downloaded. Restart to apply the update?"
            ))
            .title("Update Ready")
            .kind(MessageDialogKind::Info)
            .buttons(MessageDialogButtons::OkCancelCustom(
                "Restart".to_string(),
                "Later".to_string(),
            ))
            .show(move |confirmed| {
                let _ = tx.send(confirmed);
            });
        rx.await.unwrap_or(false)
    }
}

fn host<R: Runtime>(app: &AppHandle<R>) -> Result<State<'_, TauriHost<R>>, String> {
    app.try_state::<TauriHost<R>>().ok_or_else(|| {
        BridgeError::Unavailable("shell-bridge plugin is not initialised".into()).to_string()
    })
}

mod commands {
    use super::*;

    #[tauri::command]
    pub(crate) async fn start_log_stream<R: Runtime>(app: AppHandle<R>) -> Result<(), String> {
        host(&app)?.start_log_stream().await.map_err(|e| e.to_string())
    }

    #[tauri::command]
    pub(crate) async fn stop_log_stream<R: Runtime>(app: AppHandle<R>) -> Result<(), String> {
        host(&app)?.stop_log_stream().await.map_err(|e| e.to_string())
    }

    #[tauri::command]
    pub(crate) async fn log_stream_status<R: Runtime>(app: AppHandle<R>) -> Result<bool, String> {
        host(&app)?.log_stream_status().await.map_err(|e| e.to_string())
    }

    #[tauri::command]
    pub(crate) async fn get_port<R: Runtime>(app: AppHandle<R>) -> Result<u16, String> {
        host(&app)?.backend_port().await.map_err(|e| e.to_string())
    }

    #[tauri::command]
    pub(crate) async fn get_status_history<R: Runtime>(
        app: AppHandle<R>,
    ) -> Result<Vec<BackendStatusPayload>, String> {
        host(&app)?
            .backend_status_history()
            .await
            .map_err(|e| e.to_string())
    }

    #[tauri::command]
    pub(crate) async fn updater_check<R: Runtime>(app: AppHandle<R>) -> Result<(), String> {
        host(&app)?.check_for_updates().await.map_err(|e| e.to_string())
    }

    #[tauri::command]
    pub(crate) async fn updater_download<R: Runtime>(app: AppHandle<R>) -> Result<(), String> {
        host(&app)?.download_update().await.map_err(|e| e.to_string())
    }

    #[tauri::command]
    pub(crate) async fn updater_install<R: Runtime>(app: AppHandle<R>) -> Result<(), String> {
        host(&app)?.install_update().await.map_err(|e| e.to_string())
    }

    #[tauri::command]
    pub(crate) async fn updater_get_info<R: Runtime>(app: AppHandle<R>) -> Result<UpdateStatus, String> {
        host(&app)?.update_info().await.map_err(|e| e.to_string())
    }
}

/// The `shell-bridge` plugin: builds the [`TauriHost`], installs logging,
/// schedules the automatic update check and registers the commands.
pub fn init<R: Runtime>(config: ShellConfig) -> TauriPlugin<R> {
    PluginBuilder::new(PLUGIN_NAME)
        .invoke_handler(tauri::generate_handler![
            commands::start_log_stream,
            commands::stop_log_stream,
            commands::log_stream_status,
            commands::get_port,
            commands::get_status_history,
            commands::updater_check,
            commands::updater_download,
            commands::updater_install,
            commands::updater_get_info,
        ])
        .setup(move |app, _api| {
            let host: TauriHost<R> = ShellHost::new(
                config.clone(),
                TauriTransport::new(app.clone()),
                TauriUpdateSource::new(app.clone()),
                DialogPrompt::new(app.clone()),
            );

            if config.install_subscriber {
                if let Err(e) = init_logging(Arc::clone(host.relay())) {
                    tracing::warn!("Keeping the existing tracing subscriber: {}", e);
                }
            }
            tracing::info!("Shell bridge ready for {}", app.package_info().name);

            if config.auto_check_updates {
                let updater = Arc::clone(host.updater());
                tauri::async_runtime::spawn(updater.auto_check(config.update_check_delay));
            } else {
                tracing::info!("Skipping automatic update check");
            }

            app.manage(host);
            Ok(())
        })
        .build()
}

/// A `tauri::Builder` with the single-instance lock, dialog and updater
/// plugins and the `shell-bridge` plugin registered.
pub fn builder(config: ShellConfig) -> tauri::Builder<tauri::Wry> {
    let main_label = config.main_window_label.clone();
    tauri::Builder::default()
        // Must be registered first so a second launch never gets further.
        .plugin(tauri_plugin_single_instance::init(move |app, _argv, _cwd| {
            tracing::info!("Second instance launched, focusing existing window");
            focus_window(app, &main_label);
        }))
        .plugin(tauri_plugin_dialog::init())
        .plugin(tauri_plugin_updater::Builder::new().build())
        .plugin(init(config))
}

/// Runs when the app exits, e.g. to stop the backend child process.
/// Register it with `app.manage(ExitHook::new(..))`.
pub struct ExitHook(Box<dyn Fn() + Send + Sync>);

impl ExitHook {
    pub fn new(hook: impl Fn() + Send + Sync + 'static) -> Self {
        Self(Box::new(hook))
    }
}

/// Restore and focus the window labelled `label`, if it is open.
pub fn focus_window<R: Runtime>(app: &AppHandle<R>, label: &str) {
    if let Some(window) = app.get_webview_window(label) {
        if window.is_minimized().unwrap_or(false) {
            let _ = window.unminimize();
        }
        let _ = window.set_focus();
    }
}

/// Exit policy: closing the last window quits unless the host is configured
/// to outlive its windows (the macOS convention).
pub fn handle_run_event<R: Runtime>(app: &AppHandle<R>, event: RunEvent) {
    match event {
        RunEvent::ExitRequested { code, api, .. } => {
            // No exit code means the request came from the last window closing.
            if code.is_none() {
                tracing::info!("All windows closed");
                let keep_alive = app
                    .try_state::<TauriHost<R>>()
                    .map(|h| h.config().keep_alive_without_windows)
                    .unwrap_or(false);
                if keep_alive {
                    api.prevent_exit();
                }
            }
        }
        RunEvent::Exit => {
            tracing::info!("App is quitting, stopping log stream");
            if let Some(host) = app.try_state::<TauriHost<R>>() {
                host.relay().disable();
            }
            if let Some(hook) = app.try_state::<ExitHook>() {
                (hook.0)();
            }
        }
        _ => {}
    }
}
