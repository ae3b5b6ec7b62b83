use thiserror::Error;

/// Top-level error type for the `homeward-api` crate.
///
/// Covers every failure mode of the connection core: handshake,
/// transport, per-request resolution, and the terminal reconnect outcome.
/// `homeward-core` maps these into user-facing diagnostics.
#[derive(Debug, Clone, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// The server explicitly rejected the access token. Never retried.
    #[error("Authentication rejected: {message}")]
    AuthenticationRejected { message: String },

    // ── Protocol ────────────────────────────────────────────────────
    /// The server sent a frame that does not fit the protocol state.
    #[error("Protocol violation: {detail}")]
    ProtocolViolation { detail: String },

    /// The handshake did not complete in time.
    #[error("Handshake timed out after {timeout_secs}s")]
    HandshakeTimeout { timeout_secs: u64 },

    // ── Transport ───────────────────────────────────────────────────
    /// Websocket connect/read/write failure.
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Endpoint URL could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Endpoint URL uses a scheme other than ws/wss/http/https.
    #[error("Unsupported URL scheme: {scheme}")]
    UnsupportedScheme { scheme: String },

    // ── Per-request ─────────────────────────────────────────────────
    /// No response arrived before the request deadline.
    #[error("Request {id} timed out after {timeout_ms}ms")]
    RequestTimeout { id: u64, timeout_ms: u64 },

    /// The transport closed (or was never open) while the request was outstanding.
    #[error("Connection closed")]
    ConnectionClosed,

    /// The server answered the request with `success: false`.
    #[error("Server error ({code}): {message}")]
    Server { code: String, message: String },

    /// Outbound frame could not be encoded.
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    // ── Terminal ────────────────────────────────────────────────────
    /// Automatic reconnection gave up.
    #[error("Reconnect attempts exhausted after {attempts} tries")]
    ReconnectExhausted { attempts: u32 },

    /// The client reached `permanently-failed`; construct a new one.
    #[error("Client permanently failed -- construct a new client")]
    PermanentlyFailed,

    /// `disconnect()` was called; the client cannot be reused.
    #[error("Client disconnected")]
    Disconnected,
}

impl Error {
    /// Returns `true` for failures that end the client for good.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::AuthenticationRejected { .. }
                | Self::ReconnectExhausted { .. }
                | Self::PermanentlyFailed
        )
    }

    /// Returns `true` if this is a connection-level failure the reconnect
    /// loop should recover from.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::WebSocket(_) | Self::HandshakeTimeout { .. } | Self::ProtocolViolation { .. }
        )
    }

    /// Returns `true` if this error only concerns a single request.
    pub fn is_request_scoped(&self) -> bool {
        matches!(
            self,
            Self::RequestTimeout { .. }
                | Self::ConnectionClosed
                | Self::Server { .. }
                | Self::Serialization { .. }
        )
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::WebSocket(err.to_string())
    }
}
