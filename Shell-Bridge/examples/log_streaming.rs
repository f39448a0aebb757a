use shell_bridge::*;
use std::sync::Arc;

struct NoUpdates;

impl UpdateSource for NoUpdates {
    fn current_version(&self) -> String {
        env!("CARGO_PKG_VERSION").to_string()
    }

    async fn check(&self) -> Result<Option<UpdateInfo>, UpdateError> {
        Ok(None)
    }

    async fn download<F: FnMut(f64) + Send>(&self, _on_progress: F) -> Result<(), UpdateError> {
        Err(UpdateError::NoUpdate)
    }

    fn install(&self) -> Result<(), UpdateError> {
        Err(UpdateError::NotDownloaded)
    }
}

struct Later;

impl InstallPrompt for Later {
    async fn confirm_restart(&self, _version: &str) -> bool {
        false
    }
}

#[tokio::main]
async fn main() {
    let config = ShellConfig::builder()
        .with_stream_logs_on_start(false)
        .build();

    let windows = WindowRegistry::new();
    let host = ShellHost::new(config, windows.clone(), NoUpdates, Later);

    // Everything logged through `tracing` goes to stdout, and to the UI
    // while streaming is on.
    init_logging(Arc::clone(host.relay())).unwrap();

    let main_window = windows.open("main");
    let _logs = main_window.on(PushChannel::Log, |entry: LogEntry| {
        println!("  [ui] {:>5} {}", entry.level.as_str(), entry.message);
    });
    let _status = main_window.on(PushChannel::BackendStatus, |status: BackendStatusPayload| {
        println!("  [ui] setup: {}", status.message);
    });

    tracing::info!("Not streamed: relay is off");

    host.start_log_stream().await.unwrap();
    tracing::info!("Backend starting on port {}", host.backend_port().await.unwrap());
    tracing::warn!(attempt = 2, "Backend health check slow");

    let report = host.status().emitter();
    report(BackendStatusPayload::info("Installing Python dependencies"));
    report(BackendStatusPayload::info("Backend ready"));

    host.stop_log_stream().await.unwrap();
    tracing::info!("Not streamed either");

    // A window opened now can catch up on setup progress.
    for entry in host.backend_status_history().await.unwrap() {
        println!("history: {}", entry.message);
    }
}
