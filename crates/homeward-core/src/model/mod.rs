// ── Domain model ──
//
// Canonical types the facade hands to consumers. Raw server payloads are
// mapped into these in `crate::convert`.

pub mod action;
pub mod entity_id;
pub mod event;
pub mod state;

pub use action::ActionRequest;
pub use entity_id::EntityId;
pub use event::StateChangeEvent;
pub use state::DeviceState;
