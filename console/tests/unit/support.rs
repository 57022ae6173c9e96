//! Fake transport and recording surface shared by the integration tests

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use servconsole::console::{ConsoleSurface, ConsoleView, StatusChange};
use servconsole::transport::{
    ChannelEvent, ChannelHandle, ChannelIdentity, Connection, ConnectionState, Connector,
    TransportError,
};
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Server side of one fake connection. Dropping `to_client` closes the
/// stream from the remote end.
pub struct Remote {
    pub to_client: mpsc::UnboundedSender<Result<String, TransportError>>,
    pub from_client: mpsc::UnboundedReceiver<String>,
}

impl Remote {
    pub fn push(&self, frame: &str) {
        self.to_client.send(Ok(frame.to_string())).unwrap();
    }
}

struct FakeConnection {
    inbound: mpsc::UnboundedReceiver<Result<String, TransportError>>,
    outbound: mpsc::UnboundedSender<String>,
    closes: Arc<AtomicUsize>,
}

#[async_trait]
impl Connection for FakeConnection {
    async fn recv(&mut self) -> Option<Result<String, TransportError>> {
        self.inbound.recv().await
    }

    async fn send(&mut self, frame: String) -> Result<(), TransportError> {
        self.outbound.send(frame).map_err(|_| TransportError::Closed)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.inbound.close();
        Ok(())
    }
}

/// Hands out in-memory connections, refuses them, or never answers
pub struct FakeConnector {
    accept: AtomicBool,
    hang: AtomicBool,
    attempts: Mutex<Vec<Instant>>,
    closes: Arc<AtomicUsize>,
    remotes: mpsc::UnboundedSender<Remote>,
}

impl FakeConnector {
    pub fn new(accept: bool) -> (Arc<Self>, mpsc::UnboundedReceiver<Remote>) {
        let (remotes, remotes_rx) = mpsc::unbounded_channel();
        let connector = Arc::new(Self {
            accept: AtomicBool::new(accept),
            hang: AtomicBool::new(false),
            attempts: Mutex::new(Vec::new()),
            closes: Arc::new(AtomicUsize::new(0)),
            remotes,
        });
        (connector, remotes_rx)
    }

    pub fn set_accept(&self, accept: bool) {
        self.accept.store(accept, Ordering::SeqCst);
    }

    /// Leave connect attempts pending forever
    pub fn set_hang(&self, hang: bool) {
        self.hang.store(hang, Ordering::SeqCst);
    }

    /// Connections closed by the client side
    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Time of every connect call so far
    pub fn attempts(&self) -> Vec<Instant> {
        self.attempts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(
        &self,
        _identity: &ChannelIdentity,
    ) -> Result<Box<dyn Connection>, TransportError> {
        self.attempts.lock().unwrap().push(Instant::now());
        if self.hang.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if !self.accept.load(Ordering::SeqCst) {
            return Err(TransportError::Endpoint("connection refused".to_string()));
        }

        let (to_client, inbound) = mpsc::unbounded_channel();
        let (outbound, from_client) = mpsc::unbounded_channel();
        let _ = self.remotes.send(Remote {
            to_client,
            from_client,
        });
        Ok(Box::new(FakeConnection {
            inbound,
            outbound,
            closes: self.closes.clone(),
        }))
    }
}

/// Wait for the next state change, skipping frames
pub async fn next_state(handle: &mut ChannelHandle) -> ConnectionState {
    loop {
        match handle.recv().await {
            Some(ChannelEvent::State(state)) => return state,
            Some(ChannelEvent::Frame(_) | ChannelEvent::Dropped(_)) => continue,
            None => panic!("channel closed while waiting for a state"),
        }
    }
}

/// Wait until the channel reports `target`
pub async fn wait_for_state(handle: &mut ChannelHandle, target: ConnectionState) {
    while next_state(handle).await != target {}
}

pub fn log_frame(line: &str) -> String {
    serde_json::json!({ "type": "log-data", "line": line }).to_string()
}

/// Surface that records everything it is asked to show
#[derive(Debug, Default)]
pub struct RecordingSurface {
    pub paints: usize,
    pub painted_lines: Vec<usize>,
    pub last_painted: Option<String>,
    pub diagnostics: Vec<String>,
    pub statuses: Vec<StatusChange>,
    pub connections: Vec<ConnectionState>,
    pub notices: Vec<String>,
}

impl ConsoleSurface for RecordingSurface {
    fn paint(&mut self, view: &ConsoleView<'_>) {
        self.paints += 1;
        self.painted_lines.push(view.logs.len());
        self.last_painted = view.logs.snapshot().next_back().map(|entry| entry.text.clone());
    }

    fn diagnostic(&mut self, _at: u64, raw: &str) {
        self.diagnostics.push(raw.to_string());
    }

    fn status_changed(&mut self, _at: u64, status: &StatusChange) {
        self.statuses.push(status.clone());
    }

    fn connection_changed(&mut self, _at: u64, state: ConnectionState) {
        self.connections.push(state);
    }

    fn notice(&mut self, _at: u64, message: &str) {
        self.notices.push(message.to_string());
    }
}
