// Raw payload shapes returned by `get_states` and carried by
// `state_changed` events. `homeward-core` converts these into its
// domain types; nothing here is interpreted.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One entry of the `get_states` result array, also embedded in
/// `state_changed` event data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEntityState {
    pub entity_id: String,
    pub state: String,
    #[serde(default)]
    pub attributes: Map<String, Value>,
    #[serde(default)]
    pub last_changed: Option<String>,
    #[serde(default)]
    pub last_updated: Option<String>,
}

/// `data` of a `state_changed` event. Either side is `null` when the
/// entity was added or removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawStateChanged {
    pub entity_id: String,
    #[serde(default)]
    pub old_state: Option<RawEntityState>,
    #[serde(default)]
    pub new_state: Option<RawEntityState>,
}

/// Event type emitted for every entity state transition.
pub const STATE_CHANGED: &str = "state_changed";
