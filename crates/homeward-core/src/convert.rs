// ── Wire-to-domain conversions ──
//
// Maps raw `homeward_api` payloads into the canonical model types.
// Timestamps that fail to parse are dropped rather than failing the whole
// snapshot.

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::debug;

use homeward_api::models::{RawEntityState, RawStateChanged, STATE_CHANGED};
use homeward_api::ServerEvent;

use crate::error::CoreError;
use crate::model::{DeviceState, EntityId, StateChangeEvent};

// ── Helpers ────────────────────────────────────────────────────────

fn parse_timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

fn entity_id(raw: String) -> EntityId {
    let id = EntityId::from(raw);
    if !id.is_qualified() {
        debug!(entity_id = %id, "entity id has no category separator");
    }
    id
}

// ── DeviceState ─────────────────────────────────────────────────────

impl From<RawEntityState> for DeviceState {
    fn from(raw: RawEntityState) -> Self {
        let entity_id = entity_id(raw.entity_id);
        Self {
            category: entity_id.category().to_owned(),
            entity_id,
            state: raw.state,
            attributes: raw.attributes,
            last_changed: parse_timestamp(raw.last_changed.as_deref()),
            last_updated: parse_timestamp(raw.last_updated.as_deref()),
        }
    }
}

/// Decode a `get_states` result into snapshots.
pub(crate) fn device_states(result: Value) -> Result<Vec<DeviceState>, CoreError> {
    let raw: Vec<RawEntityState> =
        serde_json::from_value(result).map_err(|e| CoreError::Decode {
            message: format!("state list: {e}"),
        })?;
    Ok(raw.into_iter().map(DeviceState::from).collect())
}

// ── StateChangeEvent ────────────────────────────────────────────────

impl StateChangeEvent {
    /// Decode a routed server event.
    ///
    /// `Ok(None)` for event types other than `state_changed`.
    pub fn from_server_event(event: &ServerEvent) -> Result<Option<Self>, CoreError> {
        if event.event_type != STATE_CHANGED {
            return Ok(None);
        }

        let raw: RawStateChanged =
            serde_json::from_value(event.data.clone()).map_err(|e| CoreError::Decode {
                message: format!("state_changed event: {e}"),
            })?;

        let entity_id = entity_id(raw.entity_id);
        let attributes = raw
            .new_state
            .as_ref()
            .or(raw.old_state.as_ref())
            .map(|s| s.attributes.clone())
            .unwrap_or_default();

        Ok(Some(Self {
            category: entity_id.category().to_owned(),
            entity_id,
            old_state: raw.old_state.map(|s| s.state),
            new_state: raw.new_state.map(|s| s.state),
            attributes,
            time_fired: parse_timestamp(event.time_fired.as_deref()),
        }))
    }
}
