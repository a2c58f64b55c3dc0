//! Basic type definitions for the chat client
//!
//! Provides newtype wrappers and the small enums of the session model:
//! - `SessionId`: UUID-based identifier used to correlate log lines
//! - `RoomId`: opaque server-assigned room identifier
//! - `Status`, `Sender`, `ChatMessage`: the visible session state

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Number of characters of a room id shown in status text
const ROOM_ID_DISPLAY_LEN: usize = 8;

/// Unique session identifier (newtype pattern)
///
/// Wraps a UUID v4. Only used to tag log output so several sessions
/// running in one process can be told apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Create a new random session ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Room identifier assigned by the matchmaking server
///
/// Opaque: compared for equality and truncated for display, nothing more.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub String);

impl RoomId {
    /// First characters of the id, as shown in the status line
    pub fn short(&self) -> &str {
        match self.0.char_indices().nth(ROOM_ID_DISPLAY_LEN) {
            Some((idx, _)) => &self.0[..idx],
            None => &self.0,
        }
    }
}

impl std::fmt::Display for RoomId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Matchmaking status of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// No open transport connection
    #[default]
    Disconnected,
    /// Connected and waiting in the queue for a partner
    Searching,
    /// Paired with a partner in a room
    Matched,
}

/// Origin of a chat log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    Me,
    Partner,
    System,
}

/// One entry of the chat log
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub sender: Sender,
    pub text: String,
}

impl ChatMessage {
    pub fn new(sender: Sender, text: impl Into<String>) -> Self {
        Self {
            sender,
            text: text.into(),
        }
    }
}
