use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::entity_id::EntityId;

/// A device's reported value changed.
///
/// `old_state` is `None` when the entity was just added; `new_state` is
/// `None` when it was removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateChangeEvent {
    pub entity_id: EntityId,
    pub category: String,
    pub old_state: Option<String>,
    pub new_state: Option<String>,
    /// Attributes of the new state (of the old one for a removal).
    #[serde(default)]
    pub attributes: Map<String, Value>,
    pub time_fired: Option<DateTime<Utc>>,
}

impl StateChangeEvent {
    /// Whether the reported value itself changed, as opposed to only
    /// attributes.
    pub fn value_changed(&self) -> bool {
        self.old_state != self.new_state
    }
}
