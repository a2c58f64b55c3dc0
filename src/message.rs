//! Message protocol definitions
//!
//! JSON-based bidirectional message protocol using Serde's tagged enum
//! for type-safe serialization/deserialization.

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::types::RoomId;

/// Client → Server message
///
/// All intents sent to the relay. Uses tagged enum with snake_case naming.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Send a chat line to the partner
    Chat { text: String },
    /// Notify the partner that we are typing
    Typing,
    /// Leave the current partner and queue for a new one
    Next,
}

/// Server → Client message
///
/// All events received from the relay. Uses tagged enum with snake_case naming.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// No partner yet, or returned to the queue
    Searching,
    /// New partner found
    Matched {
        #[serde(rename = "roomId")]
        room_id: RoomId,
    },
    /// Chat line from the partner
    Chat { text: String },
    /// Partner is typing
    Typing,
    /// Partner left the room
    PartnerDisconnect,
    /// Server-originated notice
    System { text: String },
}

/// Serialize an outbound intent into a wire frame
pub fn encode(msg: &ClientMessage) -> Result<String, AppError> {
    Ok(serde_json::to_string(msg)?)
}

/// Interpret an inbound wire frame
///
/// Text that is not JSON at all becomes a chat line carrying the raw frame.
/// Well-formed JSON with an unknown `type` or missing fields yields `None`
/// and is ignored by the caller.
pub fn decode(raw: &str) -> Option<ServerMessage> {
    let value: serde_json::Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(_) => {
            return Some(ServerMessage::Chat {
                text: raw.to_string(),
            })
        }
    };
    serde_json::from_value(value).ok()
}
