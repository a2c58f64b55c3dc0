//! Session state machine
//!
//! `Session` is the single aggregate shown to the presentation layer.
//! `Session::apply` is a pure transition: it mutates the aggregate and
//! returns the side effects (timers, reconnect) for the engine to carry out.
//! No I/O happens here, so every transition can be tested directly.

use serde::Serialize;

use crate::message::ServerMessage;
use crate::types::{ChatMessage, RoomId, Sender, Status};

/// System notice appended when the partner leaves the room
pub const PARTNER_DISCONNECTED_NOTICE: &str = "Partner disconnected. Searching for a new match...";

/// System notice appended when we ask for a new partner
pub const FINDING_NEW_PARTNER_NOTICE: &str = "Finding someone new...";

/// Inputs that drive the state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// Transport connection opened
    ConnectionOpened,
    /// Transport connection closed (normally or after an error)
    ConnectionClosed,
    /// Decoded event from the relay
    Server(ServerMessage),
    /// Typing quiet period elapsed
    TypingExpired,
}

/// Side effects requested by a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// (Re)start the typing quiet-period countdown
    StartTypingTimer,
    /// Stop any pending typing countdown
    CancelTypingTimer,
    /// Schedule one reconnect attempt after the fixed delay
    ScheduleReconnect,
}

/// Connection, matchmaking and chat state of one client
///
/// Invariant: `status == Matched` exactly when `room_id` is set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Session {
    pub status: Status,
    pub room_id: Option<RoomId>,
    pub messages: Vec<ChatMessage>,
    pub partner_typing: bool,
}

impl Session {
    /// Fresh disconnected session with an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one input and return the effects to perform
    pub fn apply(&mut self, input: Input) -> Vec<Effect> {
        match input {
            Input::ConnectionOpened => {
                if self.status == Status::Disconnected {
                    self.status = Status::Searching;
                }
                Vec::new()
            }
            Input::ConnectionClosed => {
                self.status = Status::Disconnected;
                self.room_id = None;
                self.partner_typing = false;
                vec![Effect::CancelTypingTimer, Effect::ScheduleReconnect]
            }
            Input::TypingExpired => {
                self.partner_typing = false;
                Vec::new()
            }
            Input::Server(msg) => self.apply_server(msg),
        }
    }

    fn apply_server(&mut self, msg: ServerMessage) -> Vec<Effect> {
        match msg {
            ServerMessage::Searching => {
                let was_matched = self.status == Status::Matched;
                self.status = Status::Searching;
                self.room_id = None;
                if was_matched {
                    self.partner_typing = false;
                    vec![Effect::CancelTypingTimer]
                } else {
                    Vec::new()
                }
            }
            ServerMessage::Matched { room_id } => {
                self.status = Status::Matched;
                self.room_id = Some(room_id);
                self.messages.clear();
                self.partner_typing = false;
                vec![Effect::CancelTypingTimer]
            }
            ServerMessage::Chat { text } => {
                if self.status != Status::Matched {
                    return Vec::new();
                }
                self.push(Sender::Partner, text);
                self.partner_typing = false;
                vec![Effect::CancelTypingTimer]
            }
            ServerMessage::Typing => {
                self.partner_typing = true;
                vec![Effect::StartTypingTimer]
            }
            ServerMessage::PartnerDisconnect => {
                if self.status != Status::Matched {
                    return Vec::new();
                }
                self.status = Status::Searching;
                self.room_id = None;
                self.partner_typing = false;
                self.push(Sender::System, PARTNER_DISCONNECTED_NOTICE);
                vec![Effect::CancelTypingTimer]
            }
            ServerMessage::System { text } => {
                self.push(Sender::System, text);
                Vec::new()
            }
        }
    }

    /// Optimistic echo of a chat line we just sent
    pub fn record_sent_chat(&mut self, text: impl Into<String>) {
        self.push(Sender::Me, text);
    }

    /// Local notice for a `next` request; status changes arrive from the server
    pub fn record_next_request(&mut self) {
        self.push(Sender::System, FINDING_NEW_PARTNER_NOTICE);
    }

    /// Whether the chat input should accept text
    pub fn can_send(&self) -> bool {
        self.status == Status::Matched
    }

    /// One-line status text for the current state
    pub fn banner(&self) -> String {
        match (&self.status, &self.room_id) {
            (Status::Matched, Some(room)) => {
                format!("You are connected. Room {}...", room.short())
            }
            (Status::Matched, None) | (Status::Searching, _) => {
                "Searching for a partner...".to_string()
            }
            (Status::Disconnected, _) => "Disconnected. Reconnecting...".to_string(),
        }
    }

    fn push(&mut self, sender: Sender, text: impl Into<String>) {
        self.messages.push(ChatMessage::new(sender, text));
    }
}

/// Trimmed chat text, or `None` when nothing is left to send
pub fn outgoing_chat_text(raw: &str) -> Option<String> {
    let text = raw.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}
