// homeward-api: connection core for the home-automation websocket protocol

pub mod client;
pub mod error;
pub mod models;
pub mod protocol;
mod router;
mod session;
pub mod transport;

pub use client::{Client, ConnectionState, FailureReason, StatusNotice};
pub use error::Error;
pub use models::{RawEntityState, RawStateChanged};
pub use protocol::{Command, ServerEvent, ServiceTarget, SubscriptionId};
pub use router::EventHandler;
pub use transport::{Backoff, ClientConfig, ReconnectConfig};
