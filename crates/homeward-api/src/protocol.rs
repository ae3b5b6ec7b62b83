//! Wire frames exchanged with the automation server.
//!
//! Every websocket text frame carries one JSON object tagged by `type`.
//! Requests carry an integer `id`; the server echoes it on the matching
//! `result`. Pushed events reuse the id of the `subscribe_events` request
//! that created their subscription.

use std::fmt;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Error;

// ── SubscriptionId ───────────────────────────────────────────────────

/// Opaque handle for an event subscription.
///
/// Equal to the correlation id of the request that created it. Only valid
/// for the transport connection it was created on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(pub(crate) u64);

impl SubscriptionId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Outbound ─────────────────────────────────────────────────────────

/// A correlated request the client can send.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Bulk snapshot of every entity the server knows.
    GetStates,

    /// Invoke an action (`service`) of a category (`domain`).
    CallService {
        domain: String,
        service: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        target: Option<ServiceTarget>,
        #[serde(skip_serializing_if = "Option::is_none")]
        service_data: Option<Value>,
    },

    /// Start receiving pushed events, optionally filtered to one event type.
    SubscribeEvents {
        #[serde(skip_serializing_if = "Option::is_none")]
        event_type: Option<String>,
    },

    /// Stop a subscription created by [`Command::SubscribeEvents`].
    UnsubscribeEvents { subscription: SubscriptionId },

    /// Liveness probe, answered with `pong`.
    Ping,
}

impl Command {
    /// The wire `type` tag, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::GetStates => "get_states",
            Self::CallService { .. } => "call_service",
            Self::SubscribeEvents { .. } => "subscribe_events",
            Self::UnsubscribeEvents { .. } => "unsubscribe_events",
            Self::Ping => "ping",
        }
    }
}

/// Entity selection for an action invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceTarget {
    pub entity_id: String,
}

#[derive(Serialize)]
struct OutboundFrame<'a> {
    id: u64,
    #[serde(flatten)]
    command: &'a Command,
}

#[derive(Serialize)]
struct AuthFrame<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    access_token: &'a str,
}

/// Serialize a correlated request frame.
pub(crate) fn encode(id: u64, command: &Command) -> Result<String, Error> {
    serde_json::to_string(&OutboundFrame { id, command }).map_err(|e| Error::Serialization {
        message: e.to_string(),
    })
}

/// Serialize the credential frame. The only frame without an id.
pub(crate) fn encode_auth(token: &SecretString) -> Result<String, Error> {
    serde_json::to_string(&AuthFrame {
        kind: "auth",
        access_token: token.expose_secret(),
    })
    .map_err(|e| Error::Serialization {
        message: e.to_string(),
    })
}

// ── Inbound ──────────────────────────────────────────────────────────

/// Any frame the server may send.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum ServerFrame {
    AuthRequired {
        #[serde(default, rename = "ha_version")]
        server_version: Option<String>,
    },
    AuthOk {
        #[serde(default, rename = "ha_version")]
        server_version: Option<String>,
    },
    AuthInvalid {
        #[serde(default)]
        message: Option<String>,
    },
    Result {
        id: u64,
        success: bool,
        #[serde(default)]
        result: Value,
        #[serde(default)]
        error: Option<ServerErrorBody>,
    },
    Pong {
        id: u64,
    },
    Event {
        id: u64,
        event: RawEvent,
    },
    /// Frame types this client does not know about.
    #[serde(other)]
    Unknown,
}

impl ServerFrame {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Self::AuthRequired { .. } => "auth_required",
            Self::AuthOk { .. } => "auth_ok",
            Self::AuthInvalid { .. } => "auth_invalid",
            Self::Result { .. } => "result",
            Self::Pong { .. } => "pong",
            Self::Event { .. } => "event",
            Self::Unknown => "unknown",
        }
    }
}

/// Error description attached to a failed `result`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ServerErrorBody {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

/// Event payload as the server pushes it.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawEvent {
    pub event_type: String,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default)]
    pub time_fired: Option<String>,
}

/// Decode one text frame. The server may coalesce several messages into
/// a JSON array.
pub(crate) fn decode(text: &str) -> Result<Vec<ServerFrame>, Error> {
    let value: Value = serde_json::from_str(text).map_err(|e| Error::ProtocolViolation {
        detail: format!("malformed JSON frame: {e}"),
    })?;

    let items = match value {
        Value::Array(items) => items,
        single => vec![single],
    };

    items
        .into_iter()
        .map(|item| {
            serde_json::from_value(item).map_err(|e| Error::ProtocolViolation {
                detail: format!("unexpected frame shape: {e}"),
            })
        })
        .collect()
}

// ── ServerEvent ──────────────────────────────────────────────────────

/// A pushed event routed to a live subscription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerEvent {
    /// Subscription the event was delivered on.
    pub subscription: SubscriptionId,
    /// Event type, e.g. `"state_changed"`.
    pub event_type: String,
    /// Event-specific payload.
    pub data: Value,
    /// `"LOCAL"` or `"REMOTE"`, when provided.
    pub origin: Option<String>,
    /// ISO-8601 timestamp from the server.
    pub time_fired: Option<String>,
}

impl ServerEvent {
    pub(crate) fn from_raw(subscription: SubscriptionId, raw: RawEvent) -> Self {
        Self {
            subscription,
            event_type: raw.event_type,
            data: raw.data,
            origin: raw.origin,
            time_fired: raw.time_fired,
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
