//! Logging configuration
//!
//! Console output owns stdout, so diagnostics go to a daily rolling file
//! unless stdout logging is explicitly requested.

use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::errors::ConsoleError;

/// Log level configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn to_filter_string(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(format!("Invalid log level: {}", s)),
        }
    }
}

impl serde::Serialize for LogLevel {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.to_filter_string())
    }
}

impl<'de> serde::Deserialize<'de> for LogLevel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Logging options
#[derive(Debug, Clone)]
pub struct LogOptions {
    /// Log level
    pub log_level: LogLevel,

    /// Write logs to stdout instead of the log file
    pub stdout: bool,

    /// Log directory for file output
    pub log_dir: PathBuf,

    /// File name prefix of the rolling log
    pub file_prefix: String,

    /// Enable JSON format
    pub json_format: bool,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            stdout: false,
            log_dir: PathBuf::from("logs"),
            file_prefix: "servconsole.log".to_string(),
            json_format: false,
        }
    }
}

/// Initialize logging.
///
/// The returned guard flushes the file writer on drop and must be held for
/// the lifetime of the program.
pub fn init_logging(options: LogOptions) -> Result<Option<WorkerGuard>, ConsoleError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(options.log_level.to_filter_string()));

    let subscriber = tracing_subscriber::registry().with(filter);

    if options.stdout {
        let result = if options.json_format {
            subscriber.with(fmt::layer().json()).try_init()
        } else {
            subscriber.with(fmt::layer()).try_init()
        };
        result.map_err(|e| ConsoleError::ConfigError(e.to_string()))?;
        return Ok(None);
    }

    std::fs::create_dir_all(&options.log_dir)?;
    let appender = tracing_appender::rolling::daily(&options.log_dir, &options.file_prefix);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let result = if options.json_format {
        subscriber
            .with(fmt::layer().json().with_writer(writer))
            .try_init()
    } else {
        subscriber
            .with(fmt::layer().with_ansi(false).with_writer(writer))
            .try_init()
    };
    result.map_err(|e| ConsoleError::ConfigError(e.to_string()))?;

    Ok(Some(guard))
}
