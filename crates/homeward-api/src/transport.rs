// Endpoint and timing configuration for the connection core, plus the
// websocket dial used by every (re)connect attempt.

use std::time::Duration;

use secrecy::SecretString;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, ClientRequestBuilder};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::error::Error;

pub(crate) type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const USER_AGENT: &str = concat!("homeward/", env!("CARGO_PKG_VERSION"));

/// Path appended when the endpoint URL carries no path of its own.
pub const DEFAULT_WEBSOCKET_PATH: &str = "/api/websocket";

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Delay growth between reconnect attempts.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Backoff {
    /// Wait the same delay before every attempt.
    #[default]
    Fixed,
    /// Double the delay per attempt up to `max_delay`, with +-25% jitter.
    Exponential { max_delay: Duration },
}

/// Reconnection policy after an unexpected transport loss.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 5s.
    pub delay: Duration,

    /// Consecutive failed attempts before giving up. Default: 10.
    pub max_attempts: u32,

    /// Delay growth strategy. Default: fixed.
    pub backoff: Backoff,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(5),
            max_attempts: 10,
            backoff: Backoff::Fixed,
        }
    }
}

/// Delay to wait before attempt number `attempt` (0-based).
///
/// Exponential: `delay = min(initial * 2^attempt, max) * (1 +- 0.25)`.
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap, clippy::as_conversions)]
pub(crate) fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    match &config.backoff {
        Backoff::Fixed => config.delay,
        Backoff::Exponential { max_delay } => {
            let exponent = attempt.min(30) as i32;
            let base = config.delay.as_secs_f64() * 2.0_f64.powi(exponent);
            let capped = base.min(max_delay.as_secs_f64());

            // Deterministic jitter seeded from the attempt number.
            let jitter_factor = 1.0 + 0.25 * (f64::from(attempt) * 7.3).sin();
            Duration::from_secs_f64((capped * jitter_factor).max(0.0))
        }
    }
}

// ── ClientConfig ─────────────────────────────────────────────────────

/// Everything a [`Client`](crate::Client) needs. Immutable once the
/// client is built; a new endpoint or token requires a new client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Websocket endpoint (`ws://` or `wss://`).
    pub url: Url,
    /// Bearer credential sent in response to the server's challenge.
    pub token: SecretString,
    /// Deadline for each correlated request. Default: 30s.
    pub request_timeout: Duration,
    /// Deadline for dial + challenge + credential exchange. Default: 10s.
    pub handshake_timeout: Duration,
    /// Reconnection policy.
    pub reconnect: ReconnectConfig,
}

impl ClientConfig {
    /// Build a config with default timings.
    ///
    /// `http(s)://` endpoints are rewritten to `ws(s)://`, and a bare host
    /// gets [`DEFAULT_WEBSOCKET_PATH`] appended.
    pub fn new(endpoint: &str, token: SecretString) -> Result<Self, Error> {
        Ok(Self {
            url: normalize_endpoint(endpoint)?,
            token,
            request_timeout: Duration::from_secs(30),
            handshake_timeout: Duration::from_secs(10),
            reconnect: ReconnectConfig::default(),
        })
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    pub fn with_reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }
}

/// Parse an endpoint and coerce it to a websocket URL.
pub fn normalize_endpoint(endpoint: &str) -> Result<Url, Error> {
    let mut url = Url::parse(endpoint)?;

    let scheme = match url.scheme() {
        "ws" | "http" => "ws",
        "wss" | "https" => "wss",
        other => {
            return Err(Error::UnsupportedScheme {
                scheme: other.to_string(),
            });
        }
    };
    if url.scheme() != scheme {
        url.set_scheme(scheme).map_err(|()| Error::UnsupportedScheme {
            scheme: url.scheme().to_string(),
        })?;
    }

    if url.path().is_empty() || url.path() == "/" {
        url.set_path(DEFAULT_WEBSOCKET_PATH);
    }

    Ok(url)
}

// ── Dial ─────────────────────────────────────────────────────────────

/// Open the websocket. No protocol traffic is exchanged here.
pub(crate) async fn open(url: &Url) -> Result<WsStream, Error> {
    tracing::debug!(url = %url, "opening websocket");

    let uri: tungstenite::http::Uri = url
        .as_str()
        .parse()
        .map_err(|e: tungstenite::http::uri::InvalidUri| Error::WebSocket(e.to_string()))?;

    let request = ClientRequestBuilder::new(uri).with_header("User-Agent", USER_AGENT);

    let (ws_stream, _response) = tokio_tungstenite::connect_async(request).await?;
    Ok(ws_stream)
}

// ── Tests ────────────────────────────────────────────────────────────
