//! Console session: one mounted console for one identity
//!
//! The session owns the channel, the buffers and the render scheduler, and
//! runs the single dispatch loop that mutates them. Nothing else writes to
//! the buffers, so no locking is involved.

use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use crate::console::framer::decode;
use crate::console::input::{parse_input, UserInput};
use crate::console::router::{ConsoleState, Router, RouterStats};
use crate::console::surface::{ConsoleSurface, ConsoleView};
use crate::render::RenderScheduler;
use crate::transport::{
    ChannelEvent, ChannelHandle, ChannelIdentity, ChannelRegistry, ConnectionState,
};

/// Session options
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Lines kept in the rolling log
    pub log_capacity: usize,

    /// Points kept in the metric trend
    pub history_capacity: usize,

    /// Minimum time between two paints
    pub refresh_interval: Duration,

    /// Maximum wait for the channel to close gracefully on unmount
    pub shutdown_timeout: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            log_capacity: crate::buffer::LOG_CAPACITY,
            history_capacity: crate::buffer::HISTORY_CAPACITY,
            refresh_interval: crate::render::DEFAULT_REFRESH_INTERVAL,
            shutdown_timeout: Duration::from_secs(2),
        }
    }
}

/// Whether the dispatch loop keeps going
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// A mounted console
pub struct ConsoleSession {
    identity: ChannelIdentity,
    channel: ChannelHandle,
    state: ConsoleState,
    router: Router,
    scheduler: RenderScheduler,
    connection: ConnectionState,
    options: SessionOptions,
}

impl ConsoleSession {
    /// Mount a console for `identity`, opening its channel
    pub fn mount(
        registry: &mut ChannelRegistry,
        identity: ChannelIdentity,
        options: SessionOptions,
    ) -> Self {
        let channel = registry.open(identity.clone());
        Self::with_channel(channel, options)
    }

    /// Mount a console over an already opened channel
    pub fn with_channel(channel: ChannelHandle, options: SessionOptions) -> Self {
        info!(identity = %channel.identity(), "Mounting console");
        Self {
            identity: channel.identity().clone(),
            connection: channel.state(),
            channel,
            state: ConsoleState::new(options.log_capacity, options.history_capacity),
            router: Router::new(),
            scheduler: RenderScheduler::new(options.refresh_interval),
            options,
        }
    }

    pub fn identity(&self) -> &ChannelIdentity {
        &self.identity
    }

    /// Connection state as last observed by the dispatch loop
    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    pub fn state(&self) -> &ConsoleState {
        &self.state
    }

    pub fn scheduler(&self) -> &RenderScheduler {
        &self.scheduler
    }

    pub fn stats(&self) -> RouterStats {
        self.router.stats()
    }

    /// Apply one channel event and request a repaint if anything changed
    pub fn handle_event(
        &mut self,
        event: ChannelEvent,
        surface: &mut dyn ConsoleSurface,
        now: Instant,
    ) {
        match event {
            ChannelEvent::State(state) => {
                if state == self.connection {
                    return;
                }
                self.connection = state;
                surface.connection_changed(self.state.logs.next_id(), state);
                self.scheduler.request_repaint(now);
            }
            ChannelEvent::Dropped(count) => {
                warn!(identity = %self.identity, "Console fell behind, {} frame(s) dropped", count);
                surface.notice(
                    self.state.logs.next_id(),
                    &format!("{} frame(s) dropped while the console was busy", count),
                );
            }
            ChannelEvent::Frame(raw) => {
                for event in decode(&raw) {
                    let routed = self.router.dispatch(event, &mut self.state, surface);
                    if routed.needs_repaint() {
                        self.scheduler.request_repaint(now);
                    }
                }
            }
        }
    }

    /// Apply one operator input
    pub fn handle_input(
        &mut self,
        input: UserInput,
        surface: &mut dyn ConsoleSurface,
        now: Instant,
    ) -> Flow {
        match input {
            UserInput::Command(command) => {
                if let Err(e) = self.channel.send(&command) {
                    warn!(identity = %self.identity, "Command not sent: {}", e);
                    surface.notice(self.state.logs.next_id(), "Not connected, command not sent");
                } else {
                    debug!(identity = %self.identity, "Sent {:?}", command);
                }
                Flow::Continue
            }
            UserInput::Clear => {
                self.state.logs.clear();
                surface.notice(self.state.logs.next_id(), "Console cleared");
                self.scheduler.request_repaint(now);
                Flow::Continue
            }
            UserInput::Quit => Flow::Quit,
        }
    }

    /// Paint if a frame is pending and due
    pub fn repaint_if_due(&mut self, surface: &mut dyn ConsoleSurface, now: Instant) -> bool {
        let view = ConsoleView {
            identity: &self.identity,
            connection: self.connection,
            status: self.state.status.as_ref(),
            logs: &self.state.logs,
            metrics: &self.state.metrics,
        };
        self.scheduler.fire(now, || surface.paint(&view))
    }

    /// Run the dispatch loop until the operator quits, the shutdown signal
    /// fires or the channel ends, then unmount.
    pub async fn run<S, F>(
        mut self,
        surface: &mut S,
        mut input: mpsc::UnboundedReceiver<String>,
        shutdown_signal: F,
    ) where
        S: ConsoleSurface,
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown_signal);
        let mut input_open = true;

        loop {
            let deadline = self.scheduler.next_deadline();

            tokio::select! {
                biased;

                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.repaint_if_due(surface, Instant::now());
                }
                _ = &mut shutdown_signal => {
                    info!(identity = %self.identity, "Shutdown signal received");
                    break;
                }
                event = self.channel.recv() => match event {
                    Some(event) => self.handle_event(event, surface, Instant::now()),
                    None => {
                        warn!(identity = %self.identity, "Channel ended");
                        break;
                    }
                },
                line = input.recv(), if input_open => match line {
                    Some(line) => match parse_input(&line) {
                        Ok(Some(input)) => {
                            if self.handle_input(input, surface, Instant::now()) == Flow::Quit {
                                info!(identity = %self.identity, "Operator quit");
                                break;
                            }
                        }
                        Ok(None) => {}
                        Err(e) => surface.notice(self.state.logs.next_id(), &e),
                    },
                    None => {
                        debug!("Operator input closed");
                        input_open = false;
                    }
                },
            }
        }

        // The last pending update is always shown
        if self.scheduler.is_pending() {
            let now =
                Instant::now().max(self.scheduler.next_deadline().unwrap_or_else(Instant::now));
            self.repaint_if_due(surface, now);
        }

        self.unmount().await;
    }

    /// Close the channel gracefully and drop the console state
    pub async fn unmount(mut self) {
        info!(identity = %self.identity, "Unmounting console");
        self.channel.shutdown(self.options.shutdown_timeout).await;
    }
}
