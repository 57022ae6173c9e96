//! Servconsole - Entry Point
//!
//! Live console for a managed game server: streams its log output and
//! resource telemetry, and sends lifecycle actions and shell commands back.

use std::collections::HashMap;
use std::env;

use secrecy::SecretString;
use servconsole::app::options::AppOptions;
use servconsole::app::run::{list, run};
use servconsole::logs::{init_logging, LogLevel, LogOptions};
use servconsole::storage::layout::StorageLayout;
use servconsole::storage::settings::Settings;
use servconsole::transport::ChannelIdentity;
use servconsole::utils::version_info;

use tracing::{error, info};

const TOKEN_ENV: &str = "SERVCONSOLE_TOKEN";

#[tokio::main]
async fn main() {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut cli_args: HashMap<String, String> = HashMap::new();

    for arg in args.iter().skip(1) {
        if let Some((key, value)) = arg.split_once('=') {
            // Handle --key=value format
            let clean_key = key.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), value.to_string());
        } else if arg.starts_with("--") {
            // Handle standalone flags like --version
            let clean_key = arg.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), "true".to_string());
        }
    }

    // Print version and exit
    let version = version_info();
    if cli_args.contains_key("version") {
        match serde_json::to_string_pretty(&version) {
            Ok(json) => println!("{json}"),
            Err(e) => eprintln!("Failed to print version: {e}"),
        }
        return;
    }

    // Retrieve the settings file
    let layout = match cli_args.get("config-dir") {
        Some(dir) => StorageLayout::new(dir),
        None => StorageLayout::default(),
    };
    let mut settings = match Settings::load(&layout.settings_file()).await {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Unable to read settings file: {e}");
            return;
        }
    };

    // Command line overrides
    if let Some(level) = cli_args.get("log-level") {
        match level.parse::<LogLevel>() {
            Ok(level) => settings.log_level = level,
            Err(e) => eprintln!("{e}, keeping {}", settings.log_level.to_filter_string()),
        }
    }
    if let Some(url) = cli_args.get("base-url") {
        settings.backend.base_url = url.clone();
    }
    if let Some(url) = cli_args.get("stream-url") {
        settings.stream.base_url = Some(url.clone());
    }

    // Initialize logging
    let log_options = LogOptions {
        log_level: settings.log_level,
        stdout: settings.log_to_stdout,
        log_dir: layout.logs_dir(),
        json_format: settings.log_json,
        ..Default::default()
    };
    let _log_guard = match init_logging(log_options) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            None
        }
    };

    let token = env::var(TOKEN_ENV).ok().map(SecretString::from);
    let options = AppOptions::from_settings(&settings);

    // List servers and exit
    if let Some(filter) = cli_args.get("list") {
        let filter = if filter == "true" { "" } else { filter.as_str() };
        if let Err(e) = list(&options, token, filter).await {
            error!("Failed to list servers: {e}");
            eprintln!("Failed to list servers: {e}");
        }
        return;
    }

    let Some(server) = cli_args.get("server").filter(|id| !id.is_empty()) else {
        eprintln!("Usage: servconsole --server=<id> | --list[=<name>] | --version");
        return;
    };

    info!(
        "Running servconsole {} ({}) with options: {:?}",
        version.version, version.git_hash, options
    );
    let result = run(
        options,
        ChannelIdentity::new(server.as_str()),
        token,
        await_shutdown_signal(),
    )
    .await;
    if let Err(e) = result {
        error!("Console failed: {e}");
        eprintln!("Console failed: {e}");
    }
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let (mut sigterm, mut sigint) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
                _ => {
                    error!("Unable to install signal handlers, falling back to Ctrl+C");
                    let _ = tokio::signal::ctrl_c().await;
                    return;
                }
            };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received, shutting down...");
            }
            _ = sigint.recv() => {
                info!("SIGINT received, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {e}");
            return;
        }
        info!("Ctrl+C received, shutting down...");
    }
}
