//! Transport channel: one self-healing duplex stream per identity
//!
//! A channel worker owns the socket. It forwards inbound frames in receive
//! order, writes queued commands in call order, and after any transport
//! failure waits a fixed delay before connecting again, indefinitely, until
//! the consumer closes the handle.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch, Notify};
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::console::events::OutboundCommand;
use crate::console::framer::encode;
use crate::transport::fsm::{ChannelFsm, Transition};
use crate::transport::timer::ReconnectTimer;
use crate::transport::{
    ChannelIdentity, Connection, ConnectionState, Connector, NotConnected, TransportError,
};

/// Channel options
#[derive(Debug, Clone)]
pub struct Options {
    /// Fixed delay before every reconnect attempt
    pub reconnect_delay: Duration,

    /// Longest a single connect attempt may take before it counts as failed
    pub connect_timeout: Duration,

    /// Events held for a consumer that is not reading; frames beyond this
    /// are dropped and reported with [`ChannelEvent::Dropped`]
    pub event_capacity: usize,

    /// Maximum wait for a graceful close before the worker is aborted
    pub shutdown_timeout: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            reconnect_delay: Duration::from_millis(3000),
            connect_timeout: Duration::from_secs(10),
            event_capacity: 1024,
            shutdown_timeout: Duration::from_secs(2),
        }
    }
}

/// Item delivered to the channel consumer
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    State(ConnectionState),
    Frame(String),
    /// Frames discarded since the previous delivered frame because the
    /// consumer fell behind
    Dropped(u64),
}

/// Consumer side of an open channel.
///
/// Dropping the handle closes the channel, which also cancels any pending
/// reconnect.
pub struct ChannelHandle {
    identity: ChannelIdentity,
    session_id: Uuid,
    state_rx: watch::Receiver<ConnectionState>,
    events_rx: mpsc::Receiver<ChannelEvent>,
    outbound_tx: mpsc::UnboundedSender<String>,
    shutdown: Arc<Notify>,
    dropped: Arc<AtomicU64>,
    task: Option<JoinHandle<()>>,
    closed: bool,
}

impl ChannelHandle {
    /// Start a channel worker for `identity`; the returned handle is already
    /// `Connecting`.
    pub fn spawn(
        identity: ChannelIdentity,
        connector: Arc<dyn Connector>,
        options: Options,
    ) -> Self {
        let session_id = Uuid::new_v4();

        let mut fsm = ChannelFsm::new();
        let initial = fsm
            .process(Transition::Connect)
            .unwrap_or(ConnectionState::Connecting);

        let (state_tx, state_rx) = watch::channel(initial);
        let (events_tx, events_rx) = mpsc::channel(options.event_capacity.max(1));
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let shutdown = Arc::new(Notify::new());
        let dropped = Arc::new(AtomicU64::new(0));

        let _ = events_tx.try_send(ChannelEvent::State(initial));

        let reporter = StateReporter {
            identity: identity.clone(),
            fsm,
            state_tx,
            events_tx,
            dropped: dropped.clone(),
            unreported: 0,
        };
        let worker = Worker {
            identity: identity.clone(),
            connector,
            connect_timeout: options.connect_timeout,
            timer: ReconnectTimer::new(options.reconnect_delay),
            reporter,
            outbound_rx,
            shutdown: shutdown.clone(),
        };

        info!(identity = %identity, session = %session_id, "Opening channel");
        let task = tokio::spawn(worker.run());

        Self {
            identity,
            session_id,
            state_rx,
            events_rx,
            outbound_tx,
            shutdown,
            dropped,
            task: Some(task),
            closed: false,
        }
    }

    pub fn identity(&self) -> &ChannelIdentity {
        &self.identity
    }

    /// Current connection state.
    ///
    /// A superseded or closed channel reports `Disconnected`.
    pub fn state(&self) -> ConnectionState {
        if self.closed || self.state_rx.has_changed().is_err() {
            return ConnectionState::Disconnected;
        }
        *self.state_rx.borrow()
    }

    /// Watch receiver for state transitions
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Frames dropped so far because the consumer was not reading
    pub fn dropped_frames(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Queue a command for the remote.
    ///
    /// Fails without side effects unless the channel is `Open`.
    pub fn send(&self, command: &OutboundCommand) -> Result<(), NotConnected> {
        let state = self.state();
        if !state.is_open() {
            return Err(NotConnected { state });
        }

        self.outbound_tx
            .send(encode(command))
            .map_err(|_| NotConnected {
                state: ConnectionState::Disconnected,
            })
    }

    /// Next state change or frame; `None` once the channel is closed
    pub async fn recv(&mut self) -> Option<ChannelEvent> {
        if self.closed {
            return None;
        }
        self.events_rx.recv().await
    }

    /// Tear the channel down immediately.
    ///
    /// Cancels the reconnect timer and the worker; nothing is delivered
    /// through `recv` afterwards. Calling it again does nothing.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        if let Some(task) = self.task.take() {
            task.abort();
        }

        self.events_rx.close();
        while self.events_rx.try_recv().is_ok() {}

        debug!(identity = %self.identity, session = %self.session_id, "Channel closed");
    }

    /// Close the socket gracefully, bounded by `timeout`, then `close`
    pub async fn shutdown(&mut self, timeout: Duration) {
        if self.closed {
            return;
        }

        self.shutdown.notify_one();
        // Nobody reads events from here on; a worker waiting for queue room
        // must not hold up the close.
        self.events_rx.close();

        if let Some(task) = self.task.as_mut() {
            if tokio::time::timeout(timeout, task).await.is_err() {
                warn!(
                    identity = %self.identity,
                    "Channel did not close within {:?}, aborting",
                    timeout
                );
            }
        }

        self.close();
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn live(&self) -> Option<LiveChannel> {
        self.task.as_ref().map(|task| LiveChannel {
            shutdown: self.shutdown.clone(),
            abort: task.abort_handle(),
        })
    }
}

impl Drop for ChannelHandle {
    fn drop(&mut self) {
        self.close();
    }
}

/// Registry's grip on a running worker
struct LiveChannel {
    shutdown: Arc<Notify>,
    abort: AbortHandle,
}

impl LiveChannel {
    fn is_running(&self) -> bool {
        !self.abort.is_finished()
    }

    /// Ask the worker to close its socket, and abort it if it is still
    /// running after `grace`
    fn retire(self, grace: Duration) {
        self.shutdown.notify_one();
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            if !self.abort.is_finished() {
                self.abort.abort();
            }
        });
    }
}

/// Keeps at most one live channel per identity
pub struct ChannelRegistry {
    connector: Arc<dyn Connector>,
    options: Options,
    live: HashMap<ChannelIdentity, LiveChannel>,
}

impl ChannelRegistry {
    pub fn new(connector: Arc<dyn Connector>, options: Options) -> Self {
        Self {
            connector,
            options,
            live: HashMap::new(),
        }
    }

    /// Open a channel for `identity`. A channel previously opened for it is
    /// closed gracefully first, so no two sockets stay alive for the same
    /// identity.
    pub fn open(&mut self, identity: ChannelIdentity) -> ChannelHandle {
        self.live.retain(|_, live| live.is_running());

        if let Some(previous) = self.live.remove(&identity) {
            info!(identity = %identity, "Superseding live channel");
            previous.retire(self.options.shutdown_timeout);
        }

        let handle = ChannelHandle::spawn(
            identity.clone(),
            self.connector.clone(),
            self.options.clone(),
        );
        if let Some(live) = handle.live() {
            self.live.insert(identity, live);
        }
        handle
    }

    /// True while a worker for `identity` is still running
    pub fn is_live(&self, identity: &ChannelIdentity) -> bool {
        self.live
            .get(identity)
            .map(LiveChannel::is_running)
            .unwrap_or(false)
    }

    /// Identities tracked by the registry; finished channels are pruned on
    /// the next `open`
    pub fn tracked(&self) -> usize {
        self.live.len()
    }
}

// ================================= WORKER ===================================== //

struct StateReporter {
    identity: ChannelIdentity,
    fsm: ChannelFsm,
    state_tx: watch::Sender<ConnectionState>,
    events_tx: mpsc::Sender<ChannelEvent>,
    dropped: Arc<AtomicU64>,
    unreported: u64,
}

impl StateReporter {
    fn transition(&mut self, transition: Transition) -> Option<ConnectionState> {
        let before = self.fsm.state();
        match self.fsm.process(transition) {
            Ok(state) if state != before => {
                debug!(identity = %self.identity, "Channel {} -> {}", before, state);
                self.state_tx.send_replace(state);
                Some(state)
            }
            Ok(_) => None,
            Err(e) => {
                error!(identity = %self.identity, "{}", e);
                None
            }
        }
    }

    /// Apply a transition and report it, waiting for queue room; state
    /// changes are never dropped
    async fn apply(&mut self, transition: Transition) {
        if let Some(state) = self.transition(transition) {
            let _ = self.events_tx.send(ChannelEvent::State(state)).await;
        }
    }

    /// Apply a transition without waiting, for use while shutting down
    fn apply_now(&mut self, transition: Transition) {
        if let Some(state) = self.transition(transition) {
            let _ = self.events_tx.try_send(ChannelEvent::State(state));
        }
    }

    /// Queue a frame, or drop it when the consumer is behind.
    ///
    /// False once the consumer stopped listening.
    fn forward(&mut self, frame: String) -> bool {
        if self.unreported > 0 {
            match self.events_tx.try_send(ChannelEvent::Dropped(self.unreported)) {
                Ok(()) => self.unreported = 0,
                Err(TrySendError::Full(_)) => {
                    self.drop_frame();
                    return true;
                }
                Err(TrySendError::Closed(_)) => return false,
            }
        }

        match self.events_tx.try_send(ChannelEvent::Frame(frame)) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.drop_frame();
                true
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    fn drop_frame(&mut self) {
        if self.unreported == 0 {
            warn!(identity = %self.identity, "Consumer is behind, dropping frames");
        }
        self.unreported += 1;
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }
}

enum Exit {
    Shutdown,
    Lost(Option<TransportError>),
}

struct Worker {
    identity: ChannelIdentity,
    connector: Arc<dyn Connector>,
    connect_timeout: Duration,
    timer: ReconnectTimer,
    reporter: StateReporter,
    outbound_rx: mpsc::UnboundedReceiver<String>,
    shutdown: Arc<Notify>,
}

impl Worker {
    async fn run(mut self) {
        let connect_timeout = self.connect_timeout;

        loop {
            let connected = tokio::select! {
                _ = self.shutdown.notified() => {
                    self.finish(None).await;
                    return;
                }
                result = tokio::time::timeout(
                    connect_timeout,
                    self.connector.connect(&self.identity),
                ) => result.unwrap_or(Err(TransportError::Timeout(connect_timeout))),
            };

            match connected {
                Ok(mut conn) => {
                    info!(identity = %self.identity, "✓ Connected to stream");
                    self.reporter.apply(Transition::SocketOpened).await;
                    self.timer.reset_attempts();

                    match self.pump(conn.as_mut()).await {
                        Exit::Shutdown => {
                            self.finish(Some(conn)).await;
                            return;
                        }
                        Exit::Lost(reason) => {
                            match reason {
                                Some(e) => warn!(identity = %self.identity, "Stream error: {}", e),
                                None => warn!(identity = %self.identity, "Stream closed by remote"),
                            }
                            self.reporter.apply(Transition::SocketLost).await;
                            self.discard_pending();
                        }
                    }
                }
                Err(e) => {
                    warn!(identity = %self.identity, "Failed to connect: {}", e);
                    self.reporter.apply(Transition::ConnectFailed).await;
                }
            }

            self.timer.arm();
            info!(
                identity = %self.identity,
                attempt = self.timer.attempts(),
                "Reconnecting in {:?}...",
                self.timer.delay()
            );

            tokio::select! {
                _ = self.shutdown.notified() => {
                    self.timer.cancel();
                    self.finish(None).await;
                    return;
                }
                _ = self.timer.expired() => {}
            }

            self.reporter.apply(Transition::RetryElapsed).await;
        }
    }

    async fn pump(&mut self, conn: &mut dyn Connection) -> Exit {
        loop {
            tokio::select! {
                _ = self.shutdown.notified() => return Exit::Shutdown,
                frame = conn.recv() => match frame {
                    Some(Ok(text)) => {
                        if !self.reporter.forward(text) {
                            return Exit::Shutdown;
                        }
                    }
                    Some(Err(e)) => return Exit::Lost(Some(e)),
                    None => return Exit::Lost(None),
                },
                Some(text) = self.outbound_rx.recv() => {
                    if let Err(e) = conn.send(text).await {
                        return Exit::Lost(Some(e));
                    }
                }
            }
        }
    }

    /// Commands queued for a socket that is gone are not replayed on the
    /// next connection.
    fn discard_pending(&mut self) {
        let mut dropped = 0usize;
        while self.outbound_rx.try_recv().is_ok() {
            dropped += 1;
        }
        if dropped > 0 {
            warn!(identity = %self.identity, "Discarded {} unsent command(s)", dropped);
        }
    }

    async fn finish(&mut self, conn: Option<Box<dyn Connection>>) {
        self.reporter.apply_now(Transition::CloseRequested);
        if let Some(mut conn) = conn {
            if let Err(e) = conn.close().await {
                debug!(identity = %self.identity, "Error closing stream: {}", e);
            }
        }
        self.reporter.apply_now(Transition::Closed);
        info!(identity = %self.identity, "Channel shut down");
    }
}
