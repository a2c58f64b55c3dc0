//! Anonymous 1:1 Chat Client Library
//!
//! Client-side session engine for an anonymous one-on-one chat service,
//! built with tokio-tungstenite using the Actor pattern for state management.
//!
//! # Features
//! - Single persistent WebSocket connection to the matchmaking relay
//! - Automatic reconnect after a fixed delay
//! - Matchmaking status (disconnected → searching → matched)
//! - Chat log with optimistic local echo
//! - Partner typing indicator with a debounced quiet period
//!
//! # Architecture
//! Uses the Actor pattern with `mpsc` and `watch` channels:
//! - `SessionEngine` is the actor owning the session, connection and timers
//! - `Session::apply` is the pure state transition used by the engine
//! - `ChatClient` is the facade handle for the presentation layer
//! - No locks needed - all state access goes through message passing
//!
//! # Example
//! ```ignore
//! use anon_chat_client::{ChatClient, ClientConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let client = ChatClient::start(ClientConfig::from_env());
//!     let mut state = client.subscribe();
//!
//!     while state.changed().await.is_ok() {
//!         let session = state.borrow_and_update().clone();
//!         println!("{}", session.banner());
//!         if session.can_send() {
//!             client.send_chat("hi").unwrap();
//!         }
//!     }
//! }
//! ```

pub mod client;
pub mod config;
pub mod connection;
pub mod engine;
pub mod error;
pub mod message;
pub mod session;
pub mod types;
pub mod typing;

// Re-export main types for convenience
pub use client::ChatClient;
pub use config::ClientConfig;
pub use connection::{ConnectionManager, ConnectionState};
pub use engine::{SessionCommand, SessionEngine};
pub use error::{AppError, SendError};
pub use message::{ClientMessage, ServerMessage};
pub use session::{Effect, Input, Session};
pub use types::{ChatMessage, RoomId, Sender, SessionId, Status};
pub use typing::TypingTimer;
