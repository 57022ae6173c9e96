//! Application configuration options

use std::time::Duration;

use crate::console::SessionOptions;
use crate::storage::settings::Settings;
use crate::transport::{self, MIN_RECONNECT_DELAY};

/// Main application options
#[derive(Debug, Clone)]
pub struct AppOptions {
    /// Container REST backend base URL
    pub backend_base_url: String,

    /// Stream endpoint base URL
    pub stream_base_url: String,

    /// Channel options
    pub channel: transport::Options,

    /// Console session options
    pub session: SessionOptions,

    /// Lifecycle configuration
    pub lifecycle: LifecycleOptions,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

impl AppOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            backend_base_url: settings.backend.base_url.clone(),
            stream_base_url: settings.stream_base_url().to_string(),
            channel: transport::Options {
                reconnect_delay: Duration::from_millis(settings.stream.reconnect_delay_ms)
                    .max(MIN_RECONNECT_DELAY),
                connect_timeout: Duration::from_millis(settings.stream.connect_timeout_ms.max(1)),
                ..Default::default()
            },
            session: SessionOptions {
                log_capacity: settings.console.log_capacity.max(1),
                history_capacity: settings.console.history_capacity.max(1),
                refresh_interval: Duration::from_millis(settings.console.refresh_interval_ms),
                ..Default::default()
            },
            lifecycle: LifecycleOptions::default(),
        }
    }
}

/// Lifecycle options for the console
#[derive(Debug, Clone)]
pub struct LifecycleOptions {
    /// Maximum delay for the whole shutdown sequence before forcing exit
    pub max_shutdown_delay: Duration,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            max_shutdown_delay: Duration::from_secs(10),
        }
    }
}
