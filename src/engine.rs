//! SessionEngine Actor implementation
//!
//! The single task that owns the `Session`, the `ConnectionManager` and the
//! typing timer. Commands from the facade, transport events and timer
//! deadlines are all handled one at a time from one select loop, so no
//! transition ever runs concurrently with another.

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::connection::{ConnectionEvent, ConnectionManager, TransportEvent};
use crate::error::AppError;
use crate::message::{self, ClientMessage};
use crate::session::{self, Effect, Input, Session};
use crate::typing::TypingTimer;
use crate::types::SessionId;

/// Channel buffer size for transport events
const EVENT_BUFFER_SIZE: usize = 64;

/// Commands sent from the facade to the SessionEngine actor
#[derive(Debug)]
pub enum SessionCommand {
    /// Send a chat line to the partner
    SendChat { text: String },
    /// Tell the partner we are typing
    SendTyping,
    /// Ask the server for a new partner
    RequestNext,
    /// Close the connection and stop the engine
    Shutdown,
}

/// The session actor
pub struct SessionEngine {
    id: SessionId,
    session: Session,
    connection: ConnectionManager,
    typing: TypingTimer,
    /// Command receiver channel
    commands: mpsc::UnboundedReceiver<SessionCommand>,
    /// Transport events from the connection manager's tasks
    events: mpsc::Receiver<ConnectionEvent>,
    /// Latest session snapshot for the facade
    state: watch::Sender<Session>,
}

impl SessionEngine {
    /// Create an engine and the snapshot receiver for its session
    pub fn new(
        id: SessionId,
        config: &ClientConfig,
        commands: mpsc::UnboundedReceiver<SessionCommand>,
    ) -> (Self, watch::Receiver<Session>) {
        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER_SIZE);
        let (state_tx, state_rx) = watch::channel(Session::new());

        let engine = Self {
            id,
            session: Session::new(),
            connection: ConnectionManager::new(config.ws_url(), config.reconnect_delay, events_tx),
            typing: TypingTimer::new(config.typing_quiet),
            commands,
            events: events_rx,
            state: state_tx,
        };
        (engine, state_rx)
    }

    /// Run the engine event loop
    ///
    /// Connects immediately and keeps the connection alive until a
    /// `Shutdown` command arrives or every facade handle is dropped.
    pub async fn run(mut self) {
        info!(session = %self.id, url = %self.connection.url(), "Session engine started");

        self.connection.connect();

        loop {
            tokio::select! {
                cmd = self.commands.recv() => match cmd {
                    Some(SessionCommand::SendChat { text }) => self.handle_send_chat(&text),
                    Some(SessionCommand::SendTyping) => self.handle_send_typing(),
                    Some(SessionCommand::RequestNext) => self.handle_request_next(),
                    Some(SessionCommand::Shutdown) | None => break,
                },
                Some(event) = self.events.recv() => {
                    self.handle_connection_event(event);
                }
                _ = self.typing.expired() => self.handle_typing_expired(),
                _ = self.connection.reconnect_due() => {
                    debug!(session = %self.id, "Reconnect attempt");
                    self.connection.connect();
                }
            }
        }

        self.typing.cancel();
        self.connection.shutdown().await;

        info!(session = %self.id, "Session engine stopped");
    }

    fn handle_send_chat(&mut self, raw: &str) {
        let Some(text) = session::outgoing_chat_text(raw) else {
            debug!(session = %self.id, "Ignoring empty chat message");
            return;
        };
        if !self.connection.is_open() {
            debug!(session = %self.id, "Ignoring chat message, not connected");
            return;
        }

        let msg = ClientMessage::Chat { text: text.clone() };
        if self.transmit(&msg) {
            self.session.record_sent_chat(text);
            self.publish();
        }
    }

    fn handle_send_typing(&mut self) {
        if !self.connection.is_open() {
            debug!(session = %self.id, "Ignoring typing notification, not connected");
            return;
        }
        self.transmit(&ClientMessage::Typing);
    }

    fn handle_request_next(&mut self) {
        if !self.connection.is_open() {
            debug!(session = %self.id, "Ignoring next request, not connected");
            return;
        }
        if self.transmit(&ClientMessage::Next) {
            info!(session = %self.id, "Requested a new partner");
            self.session.record_next_request();
            self.publish();
        }
    }

    /// Encode and queue a frame; false if it could not be sent
    fn transmit(&self, msg: &ClientMessage) -> bool {
        match self.try_transmit(msg) {
            Ok(()) => true,
            Err(e) => {
                warn!(session = %self.id, "Failed to send {:?}: {}", msg, e);
                false
            }
        }
    }

    fn try_transmit(&self, msg: &ClientMessage) -> Result<(), AppError> {
        let json = message::encode(msg)?;
        self.connection.send(json)?;
        Ok(())
    }

    fn handle_typing_expired(&mut self) {
        self.typing.cancel();
        self.apply(Input::TypingExpired);
    }

    fn handle_connection_event(&mut self, event: ConnectionEvent) {
        let Some(event) = self.connection.handle(event) else {
            return;
        };

        match event {
            TransportEvent::Opened => self.apply(Input::ConnectionOpened),
            TransportEvent::Message(raw) => match message::decode(&raw) {
                Some(msg) => {
                    debug!(session = %self.id, "Received {:?}", msg);
                    self.apply(Input::Server(msg));
                }
                None => {
                    debug!(session = %self.id, "Ignoring unrecognized frame: {}", raw);
                }
            },
            // Closed follows from the transport task
            TransportEvent::Error(_) => {}
            TransportEvent::Closed => self.apply(Input::ConnectionClosed),
        }
    }

    /// Run one transition and carry out its effects
    fn apply(&mut self, input: Input) {
        let before = self.session.status;
        let effects = self.session.apply(input);

        for effect in effects {
            match effect {
                Effect::StartTypingTimer => self.typing.restart(),
                Effect::CancelTypingTimer => self.typing.cancel(),
                Effect::ScheduleReconnect => {
                    self.connection.schedule_reconnect();
                }
            }
        }

        if self.session.status != before {
            info!(
                session = %self.id,
                "Status {:?} -> {:?}",
                before,
                self.session.status
            );
        }
        self.publish();
    }

    fn publish(&self) {
        self.state.send_replace(self.session.clone());
    }
}
