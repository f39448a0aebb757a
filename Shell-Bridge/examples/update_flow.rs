use shell_bridge::*;
use std::sync::Mutex;
use std::time::Duration;

/// Pretends the update server always has 9.9.9.
struct FakeServer {
    downloaded: Mutex<bool>,
}

impl UpdateSource for FakeServer {
    fn current_version(&self) -> String {
        "1.0.0".to_string()
    }

    async fn check(&self) -> Result<Option<UpdateInfo>, UpdateError> {
        tokio::time::sleep(Duration::from_millis(100)).await;
        Ok(Some(UpdateInfo {
            version: "9.9.9".to_string(),
        }))
    }

    async fn download<F: FnMut(f64) + Send>(&self, mut on_progress: F) -> Result<(), UpdateError> {
        for pct in (0..=100).step_by(20) {
            tokio::time::sleep(Duration::from_millis(50)).await;
            on_progress(pct as f64);
        }
        *self.downloaded.lock().unwrap() = true;
        Ok(())
    }

    fn install(&self) -> Result<(), UpdateError> {
        if !*self.downloaded.lock().unwrap() {
            return Err(UpdateError::NotDownloaded);
        }
        println!("(would install and relaunch here)");
        Ok(())
    }
}

struct AskOnStdout;

impl InstallPrompt for AskOnStdout {
    async fn confirm_restart(&self, version: &str) -> bool {
        println!("A new version ({}) has been downloaded. Restart to apply the update? -> Later", version);
        false
    }
}

#[tokio::main]
async fn main() {
    let config = ShellConfig::builder()
        .with_stream_logs_on_start(false)
        .build();

    let windows = WindowRegistry::new();
    let source = FakeServer {
        downloaded: Mutex::new(false),
    };
    let host = ShellHost::new(config, windows.clone(), source, AskOnStdout);

    let window = windows.open("main");
    let _sub = window.on(PushChannel::UpdateStatus, |status: UpdateStatus| {
        println!("update-status: {}", serde_json::to_string(&status).unwrap());
    });

    host.check_for_updates().await.unwrap();

    // Auto-download runs in the background; wait until the user has answered.
    let mut phases = host.updater().subscribe();
    phases
        .wait_for(|p| matches!(p, UpdatePhase::Deferred { .. }))
        .await
        .unwrap();

    println!("Deferred. Installing from the UI later:");
    host.install_update().await.unwrap();
    println!("Final phase: {:?}", host.updater().phase());
}
