//! Settings file management

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::ConsoleError;
use crate::filesys::file::File;
use crate::logs::LogLevel;

/// Console settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Write diagnostics to stdout instead of the log file
    #[serde(default)]
    pub log_to_stdout: bool,

    /// Emit diagnostics as JSON
    #[serde(default)]
    pub log_json: bool,

    /// Container REST backend
    #[serde(default)]
    pub backend: BackendSettings,

    /// Stream endpoint
    #[serde(default)]
    pub stream: StreamSettings,

    /// Console buffers and rendering
    #[serde(default)]
    pub console: ConsoleSettings,
}

impl Settings {
    /// Read the settings file, falling back to defaults when it is missing
    pub async fn load(file: &File) -> Result<Self, ConsoleError> {
        if !file.exists().await {
            info!("No settings file at {}, using defaults", file.path().display());
            return Ok(Self::default());
        }
        file.read_json::<Settings>().await
    }

    /// Stream base URL, defaulting to the backend URL
    pub fn stream_base_url(&self) -> &str {
        self.stream
            .base_url
            .as_deref()
            .unwrap_or(&self.backend.base_url)
    }
}

/// Backend API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendSettings {
    /// Base URL for the container REST API
    #[serde(default = "default_backend_url")]
    pub base_url: String,
}

fn default_backend_url() -> String {
    "http://localhost:3000".to_string()
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            base_url: default_backend_url(),
        }
    }
}

/// Stream endpoint settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamSettings {
    /// Base URL of the stream endpoint; the backend URL when absent
    #[serde(default)]
    pub base_url: Option<String>,

    /// Fixed delay between reconnect attempts
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,

    /// Longest a connect attempt may take
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

fn default_reconnect_delay_ms() -> u64 {
    3000
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            base_url: None,
            reconnect_delay_ms: default_reconnect_delay_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

/// Console buffer and render settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsoleSettings {
    #[serde(default = "default_log_capacity")]
    pub log_capacity: usize,

    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,

    #[serde(default = "default_refresh_interval_ms")]
    pub refresh_interval_ms: u64,
}

fn default_log_capacity() -> usize {
    crate::buffer::LOG_CAPACITY
}

fn default_history_capacity() -> usize {
    crate::buffer::HISTORY_CAPACITY
}

fn default_refresh_interval_ms() -> u64 {
    crate::render::DEFAULT_REFRESH_INTERVAL.as_millis() as u64
}

impl Default for ConsoleSettings {
    fn default() -> Self {
        Self {
            log_capacity: default_log_capacity(),
            history_capacity: default_history_capacity(),
            refresh_interval_ms: default_refresh_interval_ms(),
        }
    }
}
