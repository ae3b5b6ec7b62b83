// ── Core error types ──
//
// User-facing errors from homeward-core. Consumers never see websocket
// details or raw frame shapes; the `From<homeward_api::Error>` impl
// translates connection-core errors into these variants.

use thiserror::Error;

/// Unified error type for the facade.
#[derive(Debug, Clone, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to hub: {reason}")]
    ConnectionFailed { reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Hub connection closed")]
    Disconnected,

    #[error("Hub connection permanently failed: {reason}")]
    PermanentlyFailed { reason: String },

    #[error("Request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    // ── Operation errors ─────────────────────────────────────────────
    #[error("Rejected by hub ({code}): {message}")]
    Rejected { code: String, message: String },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    #[error("Invalid entity id '{value}': expected <category>.<object>")]
    InvalidEntityId { value: String },

    #[error("Unexpected payload from hub: {message}")]
    Decode { message: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Errors that stem from the connection rather than the operation.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed { .. } | Self::Disconnected | Self::PermanentlyFailed { .. }
        )
    }
}

// ── Conversion from connection-core errors ───────────────────────────

impl From<homeward_api::Error> for CoreError {
    fn from(err: homeward_api::Error) -> Self {
        use homeward_api::Error as Api;

        match err {
            Api::AuthenticationRejected { message } => Self::AuthenticationFailed { message },
            Api::ProtocolViolation { detail } => Self::ConnectionFailed {
                reason: format!("protocol violation: {detail}"),
            },
            Api::HandshakeTimeout { timeout_secs } => Self::ConnectionFailed {
                reason: format!("handshake timed out after {timeout_secs}s"),
            },
            Api::WebSocket(reason) => Self::ConnectionFailed { reason },
            Api::InvalidUrl(e) => Self::Config {
                message: format!("invalid URL: {e}"),
            },
            Api::UnsupportedScheme { scheme } => Self::Config {
                message: format!("unsupported URL scheme '{scheme}' (use ws, wss, http or https)"),
            },
            Api::RequestTimeout { timeout_ms, .. } => Self::Timeout { timeout_ms },
            Api::ConnectionClosed | Api::Disconnected => Self::Disconnected,
            Api::Server { code, message } => Self::Rejected { code, message },
            Api::Serialization { message } => Self::Internal(message),
            Api::ReconnectExhausted { attempts } => Self::PermanentlyFailed {
                reason: format!("gave up after {attempts} reconnect attempts"),
            },
            Api::PermanentlyFailed => Self::PermanentlyFailed {
                reason: "client no longer usable".into(),
            },
        }
    }
}
