//! Typed command facade over the `homeward-api` connection core.
//!
//! - **[`Hub`]** -- one explicitly owned hub connection. Lists device
//!   states, invokes actions and manages the `state_changed` subscription.
//!   [`Hub::oneshot()`](Hub::oneshot) wraps connect/run/disconnect for
//!   single CLI invocations.
//!
//! - **Domain model** ([`model`]) -- [`DeviceState`] snapshots,
//!   [`StateChangeEvent`]s and [`EntityId`] with its derived category.
//!
//! - **[`CoreError`]** -- user-facing errors; connection-core details are
//!   translated, never exposed raw.

pub mod config;
pub mod convert;
pub mod error;
pub mod hub;
pub mod model;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::HubConfig;
pub use error::CoreError;
pub use hub::{Hub, StateChangeHandler};
pub use model::{ActionRequest, DeviceState, EntityId, StateChangeEvent};

// Connection-core types that appear in the facade's signatures.
pub use homeward_api::{Backoff, ConnectionState, FailureReason, StatusNotice, SubscriptionId};
