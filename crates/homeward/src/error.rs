//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use homeward_config::ConfigError;
use homeward_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to hub: {reason}")]
    #[diagnostic(
        code(homeward::connection_failed),
        help("Check that the hub is running and reachable, and that the URL points at it.")
    )]
    ConnectionFailed { reason: String },

    #[error("Hub connection lost: {reason}")]
    #[diagnostic(
        code(homeward::connection_lost),
        help("The hub went away and did not come back within the reconnect budget.")
    )]
    ConnectionLost { reason: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(homeward::auth_failed),
        help(
            "Verify the long-lived access token for this hub.\n\
             Pass --token, set HOMEWARD_TOKEN, or set token_env in your profile."
        )
    )]
    AuthFailed { message: String },

    #[error("No token configured for profile '{profile}'")]
    #[diagnostic(
        code(homeward::no_credentials),
        help("Pass --token, set HOMEWARD_TOKEN, or add token_env to the profile.")
    )]
    NoCredentials { profile: String },

    // ── Resources ────────────────────────────────────────────────────
    #[error("Entity '{entity_id}' not found")]
    #[diagnostic(
        code(homeward::not_found),
        help("Run: homeward states to see known entities")
    )]
    NotFound { entity_id: String },

    // ── Hub ──────────────────────────────────────────────────────────
    #[error("Hub rejected the request ({code}): {message}")]
    #[diagnostic(code(homeward::rejected))]
    Rejected { code: String, message: String },

    #[error("Unexpected response from hub: {message}")]
    #[diagnostic(code(homeward::decode))]
    Decode { message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(homeward::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(homeward::profile_not_found),
        help("Available profiles: {available}")
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No hub configured")]
    #[diagnostic(
        code(homeward::no_config),
        help(
            "Pass --url and --token, or create a profile.\n\
             Expected config at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(homeward::config))]
    Config(ConfigError),

    // ── Timeout ──────────────────────────────────────────────────────
    #[error("Request timed out after {millis}ms")]
    #[diagnostic(
        code(homeward::timeout),
        help("Increase timeout with --timeout or check hub responsiveness.")
    )]
    Timeout { millis: u64 },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON payload: {0}")]
    #[diagnostic(code(homeward::json), help("--data expects a JSON object, e.g. '{{\"brightness\": 128}}'."))]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::ConnectionLost { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } | Self::Json(_) => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { reason } => Self::ConnectionFailed { reason },
            CoreError::AuthenticationFailed { message } => Self::AuthFailed { message },
            CoreError::Disconnected => Self::ConnectionLost {
                reason: "connection closed".into(),
            },
            CoreError::PermanentlyFailed { reason } => Self::ConnectionLost { reason },
            CoreError::Timeout { timeout_ms } => Self::Timeout { millis: timeout_ms },
            CoreError::Rejected { code, message } => Self::Rejected { code, message },
            CoreError::ValidationFailed { message } => Self::Validation {
                field: "input".into(),
                reason: message,
            },
            CoreError::InvalidEntityId { value } => Self::Validation {
                field: "entity id".into(),
                reason: format!("'{value}' is not of the form <category>.<object>"),
            },
            CoreError::Decode { message } => Self::Decode { message },
            CoreError::Config { message } => Self::Validation {
                field: "config".into(),
                reason: message,
            },
            CoreError::Internal(message) => Self::Internal(message),
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoCredentials { profile } => Self::NoCredentials { profile },
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            other => Self::Config(other),
        }
    }
}
