//! ChatClient facade
//!
//! The handle given to the presentation layer. Holds the command channel to
//! the session engine and a watch receiver with the latest session snapshot.
//! All intents return as soon as the command is queued.

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::config::ClientConfig;
use crate::engine::{SessionCommand, SessionEngine};
use crate::error::SendError;
use crate::session::Session;
use crate::types::SessionId;

/// Connected chat session handle
///
/// Dropping the handle stops the engine and releases the connection.
#[derive(Debug)]
pub struct ChatClient {
    /// Session identifier used in log output
    pub id: SessionId,
    /// Facade → Engine command channel
    commands: mpsc::UnboundedSender<SessionCommand>,
    /// Engine → Facade state snapshots
    state: watch::Receiver<Session>,
    /// Engine task
    task: Option<JoinHandle<()>>,
}

impl ChatClient {
    /// Spawn a session engine and start connecting
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(config: ClientConfig) -> Self {
        let id = SessionId::new();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (engine, state) = SessionEngine::new(id, &config, cmd_rx);
        let task = tokio::spawn(engine.run());

        Self {
            id,
            commands: cmd_tx,
            state,
            task: Some(task),
        }
    }

    /// Copy of the current session state
    pub fn snapshot(&self) -> Session {
        self.state.borrow().clone()
    }

    /// Receiver notified on every session change
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.clone()
    }

    /// Send a chat line; blank text or a closed connection makes it a no-op
    pub fn send_chat(&self, text: impl Into<String>) -> Result<(), SendError> {
        self.send(SessionCommand::SendChat { text: text.into() })
    }

    /// Tell the partner we are typing; callers throttle how often
    pub fn send_typing(&self) -> Result<(), SendError> {
        self.send(SessionCommand::SendTyping)
    }

    /// Ask for a new partner
    pub fn request_next(&self) -> Result<(), SendError> {
        self.send(SessionCommand::RequestNext)
    }

    /// Close the connection and wait for the engine to stop
    pub async fn shutdown(mut self) {
        let _ = self.commands.send(SessionCommand::Shutdown);
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                debug!(session = %self.id, "Engine task ended abnormally: {}", e);
            }
        }
    }

    /// Send a command to the engine
    ///
    /// Returns an error if the engine has stopped.
    fn send(&self, cmd: SessionCommand) -> Result<(), SendError> {
        self.commands
            .send(cmd)
            .map_err(|_| SendError::ChannelClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use futures_util::{SinkExt, StreamExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::time::timeout;
    use tokio_tungstenite::tungstenite::Message;
    use tokio_tungstenite::WebSocketStream;

    use crate::session::{FINDING_NEW_PARTNER_NOTICE, PARTNER_DISCONNECTED_NOTICE};
    use crate::types::{ChatMessage, RoomId, Sender, Status};

    const WAIT: Duration = Duration::from_secs(5);

    type ServerSocket = WebSocketStream<TcpStream>;

    /// In-process relay: yields each accepted WebSocket connection
    async fn spawn_relay() -> (String, mpsc::Receiver<ServerSocket>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let (tx, rx) = mpsc::channel(8);

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let Ok(ws) = tokio_tungstenite::accept_async(stream).await else {
                    continue;
                };
                if tx.send(ws).await.is_err() {
                    break;
                }
            }
        });

        (base, rx)
    }

    fn start(base: &str) -> ChatClient {
        ChatClient::start(
            ClientConfig::new(base)
                .with_reconnect_delay(Duration::from_millis(100))
                .with_typing_quiet(Duration::from_millis(300)),
        )
    }

    async fn accept(relay: &mut mpsc::Receiver<ServerSocket>) -> ServerSocket {
        timeout(WAIT, relay.recv())
            .await
            .expect("timed out waiting for connection")
            .expect("relay stopped")
    }

    async fn wait_for(
        state: &mut watch::Receiver<Session>,
        pred: impl FnMut(&Session) -> bool,
    ) -> Session {
        let session = timeout(WAIT, state.wait_for(pred))
            .await
            .expect("timed out waiting for session state")
            .expect("engine stopped");
        Session::clone(&session)
    }

    async fn push(server: &mut ServerSocket, frame: &str) {
        server
            .send(Message::Text(frame.to_string().into()))
            .await
            .unwrap();
    }

    async fn next_frame(server: &mut ServerSocket) -> String {
        let frame = timeout(WAIT, server.next())
            .await
            .expect("timed out waiting for frame")
            .expect("connection closed")
            .unwrap();
        frame.to_text().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_match_chat_and_partner_disconnect() {
        let (base, mut relay) = spawn_relay().await;
        let client = start(&base);
        let mut state = client.subscribe();
        let mut server = accept(&mut relay).await;

        wait_for(&mut state, |s| s.status == Status::Searching).await;

        push(&mut server, r#"{"type":"searching"}"#).await;
        push(&mut server, r#"{"type":"matched","roomId":"abc123"}"#).await;
        let session = wait_for(&mut state, |s| s.status == Status::Matched).await;
        assert_eq!(session.room_id, Some(RoomId("abc123".to_string())));
        assert!(session.messages.is_empty());

        client.send_chat("hi").unwrap();
        assert_eq!(next_frame(&mut server).await, r#"{"type":"chat","text":"hi"}"#);
        let session = wait_for(&mut state, |s| s.messages.len() == 1).await;
        assert_eq!(session.messages, vec![ChatMessage::new(Sender::Me, "hi")]);

        push(&mut server, r#"{"type":"chat","text":"yo"}"#).await;
        let session = wait_for(&mut state, |s| s.messages.len() == 2).await;
        assert_eq!(
            session.messages,
            vec![
                ChatMessage::new(Sender::Me, "hi"),
                ChatMessage::new(Sender::Partner, "yo"),
            ]
        );

        push(&mut server, r#"{"type":"partner_disconnect"}"#).await;
        let session = wait_for(&mut state, |s| s.status == Status::Searching).await;
        assert!(session.room_id.is_none());
        assert_eq!(session.messages.len(), 3);
        assert_eq!(
            session.messages[2],
            ChatMessage::new(Sender::System, PARTNER_DISCONNECTED_NOTICE)
        );

        client.shutdown().await;
    }

    #[tokio::test]
    async fn test_blank_chat_not_transmitted() {
        let (base, mut relay) = spawn_relay().await;
        let client = start(&base);
        let mut state = client.subscribe();
        let mut server = accept(&mut relay).await;

        push(&mut server, r#"{"type":"matched","roomId":"r1"}"#).await;
        wait_for(&mut state, |s| s.status == Status::Matched).await;

        client.send_chat("").unwrap();
        client.send_chat("   ").unwrap();
        client.send_chat("  real  ").unwrap();

        // Commands are handled in order, so the first frame is the real one
        assert_eq!(
            next_frame(&mut server).await,
            r#"{"type":"chat","text":"real"}"#
        );
        let session = wait_for(&mut state, |s| !s.messages.is_empty()).await;
        assert_eq!(session.messages, vec![ChatMessage::new(Sender::Me, "real")]);

        client.shutdown().await;
    }

    #[tokio::test]
    async fn test_malformed_frame_becomes_partner_chat() {
        let (base, mut relay) = spawn_relay().await;
        let client = start(&base);
        let mut state = client.subscribe();
        let mut server = accept(&mut relay).await;

        push(&mut server, r#"{"type":"matched","roomId":"r1"}"#).await;
        push(&mut server, r#"{"type":"unknown_kind","x":1}"#).await;
        push(&mut server, "hello").await;

        let session = wait_for(&mut state, |s| !s.messages.is_empty()).await;
        assert_eq!(
            session.messages,
            vec![ChatMessage::new(Sender::Partner, "hello")]
        );

        client.shutdown().await;
    }

    #[tokio::test]
    async fn test_typing_indicator_clears() {
        let (base, mut relay) = spawn_relay().await;
        let client = start(&base);
        let mut state = client.subscribe();
        let mut server = accept(&mut relay).await;

        push(&mut server, r#"{"type":"matched","roomId":"r1"}"#).await;
        push(&mut server, r#"{"type":"typing"}"#).await;
        wait_for(&mut state, |s| s.partner_typing).await;

        // Quiet period expiry
        wait_for(&mut state, |s| !s.partner_typing).await;

        push(&mut server, r#"{"type":"typing"}"#).await;
        wait_for(&mut state, |s| s.partner_typing).await;
        push(&mut server, r#"{"type":"chat","text":"done"}"#).await;
        let session = wait_for(&mut state, |s| !s.messages.is_empty()).await;
        assert!(!session.partner_typing);

        client.send_typing().unwrap();
        assert_eq!(next_frame(&mut server).await, r#"{"type":"typing"}"#);

        client.shutdown().await;
    }

    #[tokio::test]
    async fn test_request_next_echoes_notice() {
        let (base, mut relay) = spawn_relay().await;
        let client = start(&base);
        let mut state = client.subscribe();
        let mut server = accept(&mut relay).await;

        push(&mut server, r#"{"type":"matched","roomId":"r1"}"#).await;
        wait_for(&mut state, |s| s.status == Status::Matched).await;

        client.request_next().unwrap();
        assert_eq!(next_frame(&mut server).await, r#"{"type":"next"}"#);
        let session = wait_for(&mut state, |s| !s.messages.is_empty()).await;
        assert_eq!(session.status, Status::Matched);
        assert_eq!(
            session.messages,
            vec![ChatMessage::new(Sender::System, FINDING_NEW_PARTNER_NOTICE)]
        );

        push(&mut server, r#"{"type":"matched","roomId":"r2"}"#).await;
        let session = wait_for(&mut state, |s| {
            s.room_id == Some(RoomId("r2".to_string()))
        })
        .await;
        assert!(session.messages.is_empty());

        client.shutdown().await;
    }

    #[tokio::test]
    async fn test_reconnects_after_server_close() {
        let (base, mut relay) = spawn_relay().await;
        let client = start(&base);
        let mut state = client.subscribe();
        let mut server = accept(&mut relay).await;

        push(&mut server, r#"{"type":"matched","roomId":"r1"}"#).await;
        wait_for(&mut state, |s| s.status == Status::Matched).await;

        server.close(None).await.unwrap();
        drop(server);

        let session = wait_for(&mut state, |s| s.status == Status::Disconnected).await;
        assert!(session.room_id.is_none());

        let _server = accept(&mut relay).await;
        wait_for(&mut state, |s| s.status == Status::Searching).await;

        // Exactly one replacement connection
        assert!(timeout(Duration::from_millis(300), relay.recv()).await.is_err());

        client.shutdown().await;
    }

    #[tokio::test]
    async fn test_intents_after_shutdown_fail() {
        let (base, _relay) = spawn_relay().await;
        let client = start(&base);
        let commands = client.commands.clone();
        client.shutdown().await;

        assert!(commands.send(SessionCommand::SendTyping).is_err());
    }
}
