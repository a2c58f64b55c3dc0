//! Anonymous 1:1 Chat Client - Entry Point
//!
//! Terminal front end: stdin lines are chat messages, `/next` asks for a
//! new partner, Ctrl-C or end of input quits.

use std::env;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

use anon_chat_client::{ChatClient, ClientConfig, RoomId, Sender, Session};

/// Command that requests a new partner
const NEXT_COMMAND: &str = "/next";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging with environment filter
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=anon_chat_client=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("anon_chat_client=info")),
        )
        .init();

    // Backend URL from command line, else from the environment
    let config = match env::args().nth(1) {
        Some(url) => ClientConfig::new(url),
        None => ClientConfig::from_env(),
    };
    info!("Relay endpoint {}", config.ws_url());

    let client = ChatClient::start(config);
    let mut state = client.subscribe();
    let mut view = View::default();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                let session = state.borrow_and_update().clone();
                view.render(&session);
            }
            line = lines.next_line() => match line? {
                Some(line) if line.trim() == NEXT_COMMAND => client.request_next()?,
                Some(line) => client.send_chat(line)?,
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    client.shutdown().await;
    Ok(())
}

/// What has already been printed
#[derive(Default)]
struct View {
    banner: String,
    room_id: Option<RoomId>,
    printed: usize,
}

impl View {
    fn render(&mut self, session: &Session) {
        let banner = session.banner();
        if banner != self.banner {
            println!("-- {}", banner);
            self.banner = banner;
        }

        // A new match clears the log
        if session.room_id.is_some() && session.room_id != self.room_id {
            self.printed = 0;
        }
        self.room_id = session.room_id.clone();
        let start = self.printed.min(session.messages.len());

        for msg in &session.messages[start..] {
            let who = match msg.sender {
                Sender::Me => "me",
                Sender::Partner => "stranger",
                Sender::System => "*",
            };
            println!("[{}] {}", who, msg.text);
        }
        self.printed = session.messages.len();
    }
}
