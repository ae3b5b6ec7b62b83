use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::entity_id::EntityId;

/// Point-in-time snapshot of one entity, as returned by
/// [`Hub::list_states`](crate::Hub::list_states).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceState {
    pub entity_id: EntityId,
    /// Text before the first `.` of the entity id.
    pub category: String,
    /// Reported value, e.g. `"on"`, `"21.5"`, `"unavailable"`.
    pub state: String,
    #[serde(default)]
    pub attributes: Map<String, Value>,
    pub last_changed: Option<DateTime<Utc>>,
    pub last_updated: Option<DateTime<Utc>>,
}

impl DeviceState {
    /// Human label from the `friendly_name` attribute, if present.
    pub fn friendly_name(&self) -> Option<&str> {
        self.attributes.get("friendly_name").and_then(Value::as_str)
    }

    /// Unit from the `unit_of_measurement` attribute, if present.
    pub fn unit(&self) -> Option<&str> {
        self.attributes
            .get("unit_of_measurement")
            .and_then(Value::as_str)
    }
}
