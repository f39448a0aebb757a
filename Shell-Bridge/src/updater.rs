//! Software-update lifecycle.
//!
//! ```text
//! Idle -> Checking -> NoUpdateFound
//!                  -> UpdateAvailable -> Downloading(0..100) -> Downloaded
//! Downloaded -> (confirm) -> Installing
//! Downloaded -> (defer)   -> Deferred -> (install) -> Installing
//! any -> Error(message)
//! ```
//!
//! Every transition publishes the full [`UpdateStatus`] on `update-status`.
//! The platform side (fetching, verifying, installing) sits behind
//! [`UpdateSource`]; the restart question behind [`InstallPrompt`].

use crate::bridge::Bridge;
use crate::config::ShellConfig;
use crate::error::UpdateError;
use crate::events::{PushChannel, UpdateStatus};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// A release offered by the update server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateInfo {
    pub version: String,
}

/// Platform updater: checks, downloads and installs releases.
pub trait UpdateSource: Send + Sync + 'static {
    /// Version of the running application.
    fn current_version(&self) -> String;

    /// Ask the update server for a newer release.
    fn check(&self) -> impl Future<Output = Result<Option<UpdateInfo>, UpdateError>> + Send;

    /// Download the release found by the last successful check, reporting
    /// progress in percent.
    fn download<F>(&self, on_progress: F) -> impl Future<Output = Result<(), UpdateError>> + Send
    where
        F: FnMut(f64) + Send;

    /// Install the downloaded release and relaunch. On success this
    /// normally does not return to a running process.
    fn install(&self) -> Result<(), UpdateError>;
}

/// Asks the user whether to restart into a downloaded release now.
pub trait InstallPrompt: Send + Sync + 'static {
    fn confirm_restart(&self, version: &str) -> impl Future<Output = bool> + Send;
}

#[derive(Debug, Clone, PartialEq)]
pub enum UpdatePhase {
    Idle,
    Checking,
    NoUpdateFound,
    UpdateAvailable { version: String },
    Downloading { version: String, progress: f64 },
    Downloaded { version: String },
    /// Downloaded, but the user chose to restart later.
    Deferred { version: String },
    Installing { version: String },
    Error { message: String },
}

impl UpdatePhase {
    /// The status snapshot published for this phase.
    pub fn status(&self) -> UpdateStatus {
        match self {
            UpdatePhase::Idle | UpdatePhase::Checking | UpdatePhase::NoUpdateFound => {
                UpdateStatus::default()
            }
            UpdatePhase::UpdateAvailable { version } => UpdateStatus {
                update_available: true,
                version: Some(version.clone()),
                downloading: Some(false),
                ..Default::default()
            },
            UpdatePhase::Downloading { version, progress } => UpdateStatus {
                update_available: true,
                version: Some(version.clone()),
                downloading: Some(true),
                progress: Some(*progress),
                error: None,
            },
            UpdatePhase::Downloaded { version }
            | UpdatePhase::Deferred { version }
            | UpdatePhase::Installing { version } => UpdateStatus {
                update_available: true,
                version: Some(version.clone()),
                downloading: Some(false),
                progress: Some(100.0),
                error: None,
            },
            UpdatePhase::Error { message } => UpdateStatus {
                error: Some(message.clone()),
                ..Default::default()
            },
        }
    }

    /// `Downloaded` counts as busy: the restart prompt is still open.
    fn is_busy(&self) -> bool {
        matches!(
            self,
            UpdatePhase::Checking
                | UpdatePhase::Downloading { .. }
                | UpdatePhase::Downloaded { .. }
                | UpdatePhase::Installing { .. }
        )
    }
}

/// Drives the update lifecycle and reports it over the bridge.
pub struct Updater<S, P> {
    source: S,
    prompt: P,
    bridge: Arc<Bridge>,
    phase: watch::Sender<UpdatePhase>,
    auto_download: bool,
    skip_prerelease: bool,
}

impl<S, P> Updater<S, P>
where
    S: UpdateSource,
    P: InstallPrompt,
{
    pub fn new(source: S, prompt: P, bridge: Arc<Bridge>, config: &ShellConfig) -> Self {
        let (phase, _) = watch::channel(UpdatePhase::Idle);
        Self {
            source,
            prompt,
            bridge,
            phase,
            auto_download: config.auto_download,
            skip_prerelease: config.skip_prerelease,
        }
    }

    pub fn phase(&self) -> UpdatePhase {
        self.phase.borrow().clone()
    }

    pub fn status(&self) -> UpdateStatus {
        self.phase.borrow().status()
    }

    /// Watch phase changes.
    pub fn subscribe(&self) -> watch::Receiver<UpdatePhase> {
        self.phase.subscribe()
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Check for a newer release.
    ///
    /// With auto-download enabled, a found release starts downloading in the
    /// background and this returns as soon as the check itself is done.
    pub async fn check(self: &Arc<Self>) -> Result<UpdateStatus, UpdateError> {
        let version = self.source.current_version();
        if self.skip_prerelease && version.contains('-') {
            tracing::info!("Skipping update check for pre-release version {}", version);
            self.begin(UpdatePhase::NoUpdateFound, |p| !p.is_busy())
                .map_err(|_| UpdateError::Busy)?;
            return Ok(self.status());
        }

        self.begin(UpdatePhase::Checking, |p| !p.is_busy())
            .map_err(|_| UpdateError::Busy)?;
        tracing::info!("Checking for update...");

        match self.source.check().await {
            Ok(Some(info)) => {
                tracing::info!("Update available: {}", info.version);
                self.transition(UpdatePhase::UpdateAvailable {
                    version: info.version,
                });
                if self.auto_download {
                    let this = Arc::clone(self);
                    tokio::spawn(async move {
                        if let Err(e) = this.download().await {
                            tracing::warn!("Automatic update download failed: {}", e);
                        }
                    });
                }
            }
            Ok(None) => {
                tracing::info!("Update not available (running {})", version);
                self.transition(UpdatePhase::NoUpdateFound);
            }
            Err(e) => {
                self.fail(&e);
                return Err(e);
            }
        }
        Ok(self.status())
    }

    /// Download the available release, then offer to restart into it.
    pub async fn download(&self) -> Result<(), UpdateError> {
        let version = match self.phase() {
            UpdatePhase::UpdateAvailable { version } => version,
            p if p.is_busy() => return Err(UpdateError::Busy),
            _ => return Err(UpdateError::NoUpdate),
        };

        let start = UpdatePhase::Downloading {
            version: version.clone(),
            progress: 0.0,
        };
        self.begin(start, |p| matches!(p, UpdatePhase::UpdateAvailable { .. }))
            .map_err(|_| UpdateError::Busy)?;

        let result = self
            .source
            .download(|progress| {
                self.transition(UpdatePhase::Downloading {
                    version: version.clone(),
                    progress: progress.clamp(0.0, 100.0),
                })
            })
            .await;

        if let Err(e) = result {
            self.fail(&e);
            return Err(e);
        }

        tracing::info!("Update downloaded: {}", version);
        self.transition(UpdatePhase::Downloaded {
            version: version.clone(),
        });

        if self.prompt.confirm_restart(&version).await {
            self.install()
        } else {
            tracing::info!("Restart into {} deferred by user", version);
            self.transition(UpdatePhase::Deferred { version });
            Ok(())
        }
    }

    /// Install a downloaded release and restart. Not cancelable once begun.
    pub fn install(&self) -> Result<(), UpdateError> {
        let version = match self.phase() {
            UpdatePhase::Downloaded { version } | UpdatePhase::Deferred { version } => version,
            UpdatePhase::Installing { .. } => return Err(UpdateError::Busy),
            _ => return Err(UpdateError::NotDownloaded),
        };

        self.begin(UpdatePhase::Installing { version }, |p| {
            matches!(p, UpdatePhase::Downloaded { .. } | UpdatePhase::Deferred { .. })
        })
        .map_err(|_| UpdateError::Busy)?;

        if let Err(e) = self.source.install() {
            self.fail(&e);
            return Err(e);
        }
        Ok(())
    }

    /// Wait `delay`, then check. Meant to be spawned at startup.
    pub async fn auto_check(self: Arc<Self>, delay: Duration) {
        tokio::time::sleep(delay).await;
        if let Err(e) = self.check().await {
            tracing::warn!("Scheduled update check failed: {}", e);
        }
    }

    fn fail(&self, err: &UpdateError) {
        tracing::error!("Error in auto-updater: {}", err);
        self.transition(UpdatePhase::Error {
            message: err.to_string(),
        });
    }

    fn transition(&self, next: UpdatePhase) {
        let status = next.status();
        self.phase.send_replace(next);
        let _ = self.bridge.push(PushChannel::UpdateStatus, &status);
    }

    /// Move to `next` only if the current phase satisfies `allowed`.
    fn begin<F>(&self, next: UpdatePhase, allowed: F) -> Result<(), UpdatePhase>
    where
        F: Fn(&UpdatePhase) -> bool,
    {
        let status = next.status();
        let mut rejected = None;
        self.phase.send_if_modified(|phase| {
            if allowed(phase) {
                *phase = next;
                true
            } else {
                rejected = Some(phase.clone());
                false
            }
        });
        match rejected {
            Some(current) => Err(current),
            None => {
                let _ = self.bridge.push(PushChannel::UpdateStatus, &status);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downloaded_and_deferred_report_full_progress() {
        for phase in [
            UpdatePhase::Downloaded {
                version: "2.0.0".into(),
            },
            UpdatePhase::Deferred {
                version: "2.0.0".into(),
            },
        ] {
            let status = phase.status();
            assert!(status.update_available);
            assert_eq!(status.version.as_deref(), Some("2.0.0"));
            assert_eq!(status.downloading, Some(false));
            assert_eq!(status.progress, Some(100.0));
        }
    }

    #[test]
    fn test_error_clears_availability() {
        let status = UpdatePhase::Error {
            message: "offline".into(),
        }
        .status();
        assert!(!status.update_available);
        assert_eq!(status.downloading, None);
        assert_eq!(status.progress, None);
        assert_eq!(status.error.as_deref(), Some("offline"));
    }

    #[test]
    fn test_busy_phases() {
        assert!(UpdatePhase::Checking.is_busy());
        assert!(UpdatePhase::Installing {
            version: "1".into()
        }
        .is_busy());
        assert!(!UpdatePhase::Deferred {
            version: "1".into()
        }
        .is_busy());
        assert!(!UpdatePhase::Error {
            message: "x".into()
        }
        .is_busy());
    }
}
