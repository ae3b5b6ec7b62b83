use serde_json::Value;

use super::entity_id::EntityId;
use crate::error::CoreError;

/// An action to invoke on the hub: `<category>.<action>` optionally aimed
/// at one entity, with optional parameters.
///
/// ```rust,ignore
/// let request = ActionRequest::new("light", "turn_on")
///     .target("light.kitchen".parse()?)
///     .parameters(serde_json::json!({ "brightness": 128 }));
/// hub.invoke_action(&request).await?;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ActionRequest {
    pub category: String,
    pub action: String,
    pub target: Option<EntityId>,
    pub parameters: Option<Value>,
}

impl ActionRequest {
    pub fn new(category: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            action: action.into(),
            target: None,
            parameters: None,
        }
    }

    pub fn target(mut self, entity_id: EntityId) -> Self {
        self.target = Some(entity_id);
        self
    }

    pub fn parameters(mut self, parameters: Value) -> Self {
        self.parameters = Some(parameters);
        self
    }

    pub(crate) fn validate(&self) -> Result<(), CoreError> {
        if self.category.trim().is_empty() || self.action.trim().is_empty() {
            return Err(CoreError::ValidationFailed {
                message: "action category and name must not be empty".into(),
            });
        }
        if let Some(parameters) = &self.parameters {
            if !parameters.is_object() {
                return Err(CoreError::ValidationFailed {
                    message: "action parameters must be a JSON object".into(),
                });
            }
        }
        Ok(())
    }
}
