use thiserror::Error;

/// Errors that can occur on the privileged side of the bridge.
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Bridge unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Update(#[from] UpdateError),

    #[error("Logging setup failed: {0}")]
    Logging(String),

    #[error("Event emission failed: {0}")]
    Event(String),

    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for BridgeError {
    fn from(err: anyhow::Error) -> Self {
        BridgeError::Other(err.to_string())
    }
}

#[cfg(feature = "tauri")]
impl From<tauri::Error> for BridgeError {
    fn from(err: tauri::Error) -> Self {
        BridgeError::Event(err.to_string())
    }
}

/// Failures of the software-update lifecycle.
///
/// The `Display` text is what ends up in `UpdateStatus.error`, so it is
/// written for the user.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UpdateError {
    #[error("Update check failed: {0}")]
    Check(String),

    #[error("Update download failed: {0}")]
    Download(String),

    #[error("Update install failed: {0}")]
    Install(String),

    #[error("No update is available to download")]
    NoUpdate,

    #[error("No downloaded update is ready to install")]
    NotDownloaded,

    #[error("An update is already being downloaded or installed")]
    Busy,
}
