//! Main application run loop

use std::future::Future;
use std::io::BufRead;
use std::sync::Arc;

use colored::Colorize;
use console_api::ContainerSummary;
use secrecy::SecretString;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::app::options::{AppOptions, LifecycleOptions};
use crate::console::input::HELP;
use crate::console::{ConsoleSession, ConsoleSurface, TerminalSurface};
use crate::errors::ConsoleError;
use crate::http::client::HttpClient;
use crate::http::containers::filter_by_name;
use crate::transport::ws::WsConnector;
use crate::transport::{ChannelIdentity, ChannelRegistry};
use crate::utils::truncate;

/// Mount a console for `identity` and run it until the operator quits or
/// `shutdown_signal` fires
pub async fn run(
    options: AppOptions,
    identity: ChannelIdentity,
    token: Option<SecretString>,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<(), ConsoleError> {
    info!("Initializing console for {}...", identity);

    // Create shutdown channel
    let (shutdown_tx, _shutdown_rx): (broadcast::Sender<()>, _) = broadcast::channel(1);
    let mut shutdown_manager = ShutdownManager::new(shutdown_tx.clone(), options.lifecycle.clone());

    let mut surface = TerminalSurface::new(std::io::stdout());
    surface.notice(0, HELP);
    let identity = show_snapshot(&options, identity, token.clone(), &mut surface).await;

    let connector = Arc::new(WsConnector::new(&options.stream_base_url, token)?);
    let mut registry = ChannelRegistry::new(connector, options.channel.clone());
    let session = ConsoleSession::mount(&mut registry, identity, options.session.clone());

    let input_rx = spawn_input_reader()?;
    let mut shutdown_rx = shutdown_tx.subscribe();
    let mut session_handle = tokio::spawn(async move {
        session
            .run(&mut surface, input_rx, async move {
                let _ = shutdown_rx.recv().await;
            })
            .await;
    });

    tokio::select! {
        _ = shutdown_signal => {
            info!("Shutdown signal received, shutting down...");
            shutdown_manager.with_session_handle(session_handle)?;
        }
        result = &mut session_handle => {
            result.map_err(|e| ConsoleError::ShutdownError(e.to_string()))?;
            info!("Console session ended");
        }
    }

    // Shutdown
    drop(shutdown_tx);
    shutdown_manager.shutdown().await
}

/// Print the servers known to the backend, optionally filtered by name
pub async fn list(
    options: &AppOptions,
    token: Option<SecretString>,
    filter: &str,
) -> Result<(), ConsoleError> {
    let client = HttpClient::new(&options.backend_base_url, token)?;
    let containers = client.list_containers().await?;

    let mut shown = 0;
    for container in filter_by_name(&containers, filter) {
        println!("{}", format_container(container));
        shown += 1;
    }
    if shown == 0 {
        println!("No servers found");
    }
    Ok(())
}

/// One line of the server listing
pub fn format_container(container: &ContainerSummary) -> String {
    let marker = if container.is_running() {
        "●".green()
    } else {
        "○".red()
    };
    format!(
        "{} {:<24} {}  {:<22} {}",
        marker,
        truncate(container.display_name(), 24),
        container.short_id(),
        container.endpoint(),
        container.status.as_deref().unwrap_or_default(),
    )
}

// =============================== INITIALIZATION ================================== //

/// Show the backend's view of the server before the stream opens.
///
/// A unique id prefix is resolved to the full id here. Failures only cost
/// the snapshot; the stream is still opened with the identity as given.
async fn show_snapshot(
    options: &AppOptions,
    identity: ChannelIdentity,
    token: Option<SecretString>,
    surface: &mut dyn ConsoleSurface,
) -> ChannelIdentity {
    let client = match HttpClient::new(&options.backend_base_url, token) {
        Ok(client) => client,
        Err(e) => {
            warn!("Unable to create HTTP client: {}", e);
            return identity;
        }
    };

    match client.get_container(identity.as_str()).await {
        Ok(container) => {
            surface.notice(
                0,
                &format!(
                    "{} ({}) is {} at {}",
                    container.display_name(),
                    container.short_id(),
                    container.state.as_deref().unwrap_or("unknown"),
                    container.endpoint(),
                ),
            );
            ChannelIdentity::new(container.id.as_str())
        }
        Err(e) => {
            warn!("No status snapshot for {}: {}", identity, e);
            surface.notice(0, &format!("No status snapshot: {}", e));
            identity
        }
    }
}

/// Read operator lines from stdin on a dedicated thread.
///
/// Blocking stdin reads cannot be cancelled, so the thread is detached and
/// ends with the process.
fn spawn_input_reader() -> Result<mpsc::UnboundedReceiver<String>, ConsoleError> {
    let (input_tx, input_rx) = mpsc::unbounded_channel();

    std::thread::Builder::new()
        .name("console-input".to_string())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                match line {
                    Ok(line) => {
                        if input_tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("Reading operator input failed: {}", e);
                        break;
                    }
                }
            }
            debug!("Operator input reader finished");
        })?;

    Ok(input_rx)
}

// ================================= SHUTDOWN ===================================== //

struct ShutdownManager {
    shutdown_tx: broadcast::Sender<()>,
    lifecycle_options: LifecycleOptions,
    session_handle: Option<JoinHandle<()>>,
}

impl ShutdownManager {
    pub fn new(shutdown_tx: broadcast::Sender<()>, lifecycle_options: LifecycleOptions) -> Self {
        Self {
            shutdown_tx,
            lifecycle_options,
            session_handle: None,
        }
    }

    pub fn with_session_handle(&mut self, handle: JoinHandle<()>) -> Result<(), ConsoleError> {
        if self.session_handle.is_some() {
            return Err(ConsoleError::ShutdownError(
                "session_handle already set".to_string(),
            ));
        }
        self.session_handle = Some(handle);
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<(), ConsoleError> {
        let _ = self.shutdown_tx.send(());

        match tokio::time::timeout(
            self.lifecycle_options.max_shutdown_delay,
            self.shutdown_impl(),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                error!(
                    "Shutdown timed out after {:?}, forcing shutdown...",
                    self.lifecycle_options.max_shutdown_delay
                );
                std::process::exit(1);
            }
        }
    }

    async fn shutdown_impl(&mut self) -> Result<(), ConsoleError> {
        info!("Shutting down console...");

        // The session unmounts itself, closing its channel
        if let Some(handle) = self.session_handle.take() {
            handle
                .await
                .map_err(|e| ConsoleError::ShutdownError(e.to_string()))?;
        }

        info!("Shutdown complete");
        Ok(())
    }
}
