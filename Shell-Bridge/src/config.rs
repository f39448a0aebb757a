use std::time::Duration;

/// Port the backend listens on unless the privileged process assigns another.
pub const DEFAULT_BACKEND_PORT: u16 = 8000;

/// Capacity of the privileged-side backend status history.
pub const MAX_STATUS_HISTORY: usize = 100;

/// Configuration for the privileged-process side of the shell.
///
/// Use [`ShellConfig::builder()`] for ergonomic construction, or
/// [`ShellConfig::default()`] for the production defaults.
#[derive(Debug, Clone)]
pub struct ShellConfig {
    /// Backend port reported to windows until the launcher assigns one.
    pub default_backend_port: u16,

    /// How many backend status payloads to keep for late-opening windows.
    pub status_history_capacity: usize,

    /// Enable log streaming as soon as the host starts, so backend
    /// initialisation output is captured.
    pub stream_logs_on_start: bool,

    /// Check for updates automatically after start (release builds only by default).
    pub auto_check_updates: bool,

    /// Delay between start and the automatic update check.
    pub update_check_delay: Duration,

    /// Start downloading as soon as a check finds a release.
    pub auto_download: bool,

    /// Never check when running a pre-release (`x.y.z-beta`) build.
    pub skip_prerelease: bool,

    /// Label of the window focused when a second instance is launched.
    pub main_window_label: String,

    /// Keep the process alive after the last window closes.
    pub keep_alive_without_windows: bool,

    /// Install the global `tracing` subscriber with the relay layer.
    pub install_subscriber: bool,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            default_backend_port: DEFAULT_BACKEND_PORT,
            status_history_capacity: MAX_STATUS_HISTORY,
            stream_logs_on_start: true,
            auto_check_updates: !cfg!(debug_assertions),
            update_check_delay: Duration::from_secs(5),
            auto_download: true,
            skip_prerelease: true,
            main_window_label: "main".to_string(),
            keep_alive_without_windows: cfg!(target_os = "macos"),
            install_subscriber: true,
        }
    }
}

impl ShellConfig {
    /// Start building a config with the builder pattern.
    pub fn builder() -> ShellConfigBuilder {
        ShellConfigBuilder::default()
    }
}

/// Builder for [`ShellConfig`].
#[derive(Default)]
pub struct ShellConfigBuilder {
    config: ShellConfig,
}

impl ShellConfigBuilder {
    pub fn with_default_backend_port(mut self, port: u16) -> Self {
        self.config.default_backend_port = port;
        self
    }

    pub fn with_status_history_capacity(mut self, capacity: usize) -> Self {
        self.config.status_history_capacity = capacity;
        self
    }

    pub fn with_stream_logs_on_start(mut self, enabled: bool) -> Self {
        self.config.stream_logs_on_start = enabled;
        self
    }

    pub fn with_auto_check_updates(mut self, enabled: bool) -> Self {
        self.config.auto_check_updates = enabled;
        self
    }

    pub fn with_update_check_delay(mut self, delay: Duration) -> Self {
        self.config.update_check_delay = delay;
        self
    }

    pub fn with_auto_download(mut self, enabled: bool) -> Self {
        self.config.auto_download = enabled;
        self
    }

    pub fn with_skip_prerelease(mut self, enabled: bool) -> Self {
        self.config.skip_prerelease = enabled;
        self
    }

    pub fn with_main_window_label(mut self, label: impl Into<String>) -> Self {
        self.config.main_window_label = label.into();
        self
    }

    pub fn with_keep_alive_without_windows(mut self, enabled: bool) -> Self {
        self.config.keep_alive_without_windows = enabled;
        self
    }

    pub fn with_install_subscriber(mut self, enabled: bool) -> Self {
        self.config.install_subscriber = enabled;
        self
    }

    /// Build the final [`ShellConfig`].
    pub fn build(self) -> ShellConfig {
        self.config
    }
}
