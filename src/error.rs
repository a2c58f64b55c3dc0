//! Error types for the chat client
//!
//! Defines internal errors and facade send errors.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

/// Application-level errors
///
/// None of these is surfaced as session state: transport failures end in a
/// reconnect and codec failures degrade or are dropped.
#[derive(Debug, Error)]
pub enum AppError {
    /// WebSocket protocol or handshake error
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// JSON serialization/deserialization error
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Backend base URL could not be parsed
    #[error("Invalid backend URL: {0}")]
    Url(#[from] url::ParseError),

    /// Backend URL scheme cannot be mapped to a WebSocket scheme
    #[error("Unsupported URL scheme: {0}")]
    UnsupportedScheme(String),

    /// Internal channel to a stopped task
    #[error("Channel closed")]
    ChannelClosed,

    /// No open transport connection
    #[error("Not connected")]
    NotConnected,
}

/// Message send errors
///
/// Occurs when attempting to send through a closed channel or socket.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SendError {
    /// The receiving end of the channel has been closed
    #[error("Channel closed")]
    ChannelClosed,

    /// The transport connection is not open
    #[error("Not connected")]
    NotConnected,
}

impl From<SendError> for AppError {
    fn from(err: SendError) -> Self {
        match err {
            SendError::ChannelClosed => AppError::ChannelClosed,
            SendError::NotConnected => AppError::NotConnected,
        }
    }
}
