//! Client configuration
//!
//! One environment setting (`CHAT_BACKEND_URL`) plus timing knobs that
//! default to the production values.

use std::env;
use std::time::Duration;

use tracing::warn;
use url::Url;

use crate::error::AppError;

/// Environment variable holding the backend base URL
pub const BACKEND_URL_ENV: &str = "CHAT_BACKEND_URL";

/// Backend base URL used when the environment variable is unset
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";

/// WebSocket URL used when the configured base cannot be parsed
pub const FALLBACK_WS_URL: &str = "ws://localhost:8000/ws";

/// Path of the relay endpoint on the backend
pub const WS_PATH: &str = "/ws";

/// Quiet period after the last `typing` event before the indicator clears
pub const DEFAULT_TYPING_QUIET: Duration = Duration::from_millis(1200);

/// Delay between a connection loss and the next connect attempt
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend base URL (http or https)
    pub backend_url: String,
    pub typing_quiet: Duration,
    pub reconnect_delay: Duration,
}

impl ClientConfig {
    pub fn new(backend_url: impl Into<String>) -> Self {
        Self {
            backend_url: backend_url.into(),
            typing_quiet: DEFAULT_TYPING_QUIET,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
        }
    }

    /// Read the backend URL from `CHAT_BACKEND_URL`, empty counts as unset
    pub fn from_env() -> Self {
        let backend_url = env::var(BACKEND_URL_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string());
        Self::new(backend_url)
    }

    #[must_use]
    pub fn with_typing_quiet(mut self, quiet: Duration) -> Self {
        self.typing_quiet = quiet;
        self
    }

    #[must_use]
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Relay WebSocket URL derived from the backend base
    pub fn ws_url(&self) -> String {
        websocket_url(&self.backend_url)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BACKEND_URL)
    }
}

/// Map an http(s) base URL to the relay's ws(s) endpoint
///
/// Falls back to `FALLBACK_WS_URL` when the base cannot be used.
pub fn websocket_url(base: &str) -> String {
    match parse_ws_url(base) {
        Ok(url) => url.to_string(),
        Err(e) => {
            warn!("Using fallback relay URL, '{}' rejected: {}", base, e);
            FALLBACK_WS_URL.to_string()
        }
    }
}

fn parse_ws_url(base: &str) -> Result<Url, AppError> {
    let mut url = Url::parse(base)?;
    let scheme = match url.scheme() {
        "https" | "wss" => "wss",
        _ => "ws",
    };
    url.set_scheme(scheme)
        .map_err(|_| AppError::UnsupportedScheme(url.scheme().to_string()))?;
    url.set_path(WS_PATH);
    Ok(url)
}
