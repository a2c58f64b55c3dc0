//! Transport connection manager
//!
//! Owns at most one WebSocket connection at a time. The socket itself lives
//! in a spawned transport task; the manager talks to it through an outbound
//! mpsc channel and receives its lifecycle events on a shared event channel.
//! Every connection gets a new generation number, and events carrying an
//! older generation are discarded so a torn-down socket can never affect
//! the session.

use std::future;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, timeout, Instant};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::error::{AppError, SendError};

/// Time the transport task gets to send a close frame on shutdown
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Lifecycle state of the managed connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No socket
    Idle,
    /// Handshake in progress
    Connecting,
    /// Socket open, frames can be sent
    Open,
}

/// Event reported by a transport task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Opened,
    Message(String),
    Error(String),
    Closed,
}

/// Transport event tagged with the connection that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionEvent {
    pub generation: u64,
    pub event: TransportEvent,
}

pub struct ConnectionManager {
    url: String,
    reconnect_delay: Duration,
    state: ConnectionState,
    generation: u64,
    outbound: Option<mpsc::UnboundedSender<Message>>,
    task: Option<JoinHandle<()>>,
    events: mpsc::Sender<ConnectionEvent>,
    reconnect_at: Option<Instant>,
}

impl ConnectionManager {
    /// Create an idle manager; nothing connects until `connect()`
    pub fn new(
        url: impl Into<String>,
        reconnect_delay: Duration,
        events: mpsc::Sender<ConnectionEvent>,
    ) -> Self {
        Self {
            url: url.into(),
            reconnect_delay,
            state: ConnectionState::Idle,
            generation: 0,
            outbound: None,
            task: None,
            events,
            reconnect_at: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == ConnectionState::Open
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Whether a reconnect attempt is pending
    pub fn reconnect_pending(&self) -> bool {
        self.reconnect_at.is_some()
    }

    /// Start a new connection attempt
    ///
    /// Returns false without doing anything if a connection is already open
    /// or opening. Consumes any pending reconnect deadline either way.
    pub fn connect(&mut self) -> bool {
        self.reconnect_at = None;

        if self.state != ConnectionState::Idle {
            debug!("Connect skipped, connection is {:?}", self.state);
            return false;
        }

        self.generation += 1;
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        self.outbound = Some(outbound_tx);
        self.state = ConnectionState::Connecting;

        debug!("Connecting to {} (generation {})", self.url, self.generation);
        self.task = Some(tokio::spawn(run_transport(
            self.url.clone(),
            self.generation,
            outbound_rx,
            self.events.clone(),
        )));
        true
    }

    /// Update lifecycle state from a transport event
    ///
    /// Returns the event for the session to act on, or `None` if it came
    /// from a connection that has already been replaced or closed.
    pub fn handle(&mut self, event: ConnectionEvent) -> Option<TransportEvent> {
        if event.generation != self.generation || self.state == ConnectionState::Idle {
            debug!("Dropping stale event from generation {}", event.generation);
            return None;
        }

        match &event.event {
            TransportEvent::Opened => {
                info!("Connected to {}", self.url);
                self.state = ConnectionState::Open;
            }
            TransportEvent::Message(_) => {}
            TransportEvent::Error(e) => {
                // The transport task closes the socket and reports Closed next
                warn!("Connection error: {}", e);
            }
            TransportEvent::Closed => {
                info!("Connection to {} closed", self.url);
                self.state = ConnectionState::Idle;
                self.outbound = None;
                self.task = None;
            }
        }
        Some(event.event)
    }

    /// Queue a text frame on the open socket
    pub fn send(&self, text: String) -> Result<(), SendError> {
        if self.state != ConnectionState::Open {
            return Err(SendError::NotConnected);
        }
        let outbound = self.outbound.as_ref().ok_or(SendError::NotConnected)?;
        outbound
            .send(Message::Text(text.into()))
            .map_err(|_| SendError::NotConnected)
    }

    /// Arm one reconnect attempt after the fixed delay
    ///
    /// Returns false if a connection is open or opening, or an attempt is
    /// already pending.
    pub fn schedule_reconnect(&mut self) -> bool {
        if self.state != ConnectionState::Idle || self.reconnect_at.is_some() {
            return false;
        }
        info!("Reconnecting in {:?}", self.reconnect_delay);
        self.reconnect_at = Some(Instant::now() + self.reconnect_delay);
        true
    }

    /// Resolves when the pending reconnect deadline elapses; never if none
    pub async fn reconnect_due(&self) {
        match self.reconnect_at {
            Some(at) => sleep_until(at).await,
            None => future::pending().await,
        }
    }

    /// Close the socket and forget the connection
    ///
    /// The transport task gets a short grace period to send a close frame
    /// before it is aborted. No reconnect is scheduled.
    pub async fn shutdown(&mut self) {
        self.reconnect_at = None;
        self.state = ConnectionState::Idle;
        // Bump so anything the old task still reports is stale
        self.generation += 1;
        self.outbound = None;

        if let Some(mut task) = self.task.take() {
            if timeout(SHUTDOWN_GRACE, &mut task).await.is_err() {
                debug!("Transport task did not stop in time, aborting");
                task.abort();
            }
        }
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("url", &self.url)
            .field("state", &self.state)
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

/// Report an event for this connection; false once the receiver is gone
async fn emit(
    events: &mpsc::Sender<ConnectionEvent>,
    generation: u64,
    event: TransportEvent,
) -> bool {
    events
        .send(ConnectionEvent { generation, event })
        .await
        .is_ok()
}

/// Install the process-wide rustls crypto provider used for wss://
///
/// Later calls find the provider already installed and do nothing.
fn install_crypto_provider() {
    let _ = rustls::crypto::ring::default_provider().install_default();
}

async fn open(url: &str) -> Result<WsStream, AppError> {
    install_crypto_provider();
    let (ws_stream, _response) = connect_async(url).await?;
    Ok(ws_stream)
}

/// Own one socket from handshake to close
///
/// Always finishes by reporting `Closed`, including after a failed
/// handshake or a socket error.
async fn run_transport(
    url: String,
    generation: u64,
    mut outbound: mpsc::UnboundedReceiver<Message>,
    events: mpsc::Sender<ConnectionEvent>,
) {
    let ws_stream = match open(&url).await {
        Ok(ws_stream) => ws_stream,
        Err(e) => {
            emit(&events, generation, TransportEvent::Error(e.to_string())).await;
            emit(&events, generation, TransportEvent::Closed).await;
            return;
        }
    };

    if !emit(&events, generation, TransportEvent::Opened).await {
        return;
    }

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    loop {
        tokio::select! {
            frame = ws_receiver.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    if !emit(&events, generation, TransportEvent::Message(text.to_string())).await {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    debug!("Server closed connection (generation {})", generation);
                    break;
                }
                Some(Ok(_)) => {
                    // Binary, ping and pong frames carry no protocol events
                }
                Some(Err(e)) => {
                    emit(&events, generation, TransportEvent::Error(e.to_string())).await;
                    break;
                }
            },
            out = outbound.recv() => match out {
                Some(msg) => {
                    if let Err(e) = ws_sender.send(msg).await {
                        emit(&events, generation, TransportEvent::Error(e.to_string())).await;
                        break;
                    }
                }
                None => {
                    debug!("Closing connection (generation {})", generation);
                    break;
                }
            },
        }
    }

    let _ = ws_sender.close().await;
    emit(&events, generation, TransportEvent::Closed).await;
}
