// ── Entity identity ──
//
// Every device the hub knows is addressed as `<category>.<object>`, e.g.
// `light.kitchen`. The category is the text before the first `.`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

const SEPARATOR: char = '.';

/// Identifier of a hub entity.
///
/// Construction from server data is lenient (`From<String>`): an id with no
/// separator is kept as-is and its whole text becomes the category.
/// Parsing user input (`FromStr`) is strict.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Coarse category: text before the first separator, or the whole id.
    pub fn category(&self) -> &str {
        self.0
            .split_once(SEPARATOR)
            .map_or(self.0.as_str(), |(category, _)| category)
    }

    /// Text after the first separator, if any.
    pub fn object_id(&self) -> Option<&str> {
        self.0.split_once(SEPARATOR).map(|(_, object)| object)
    }

    /// Whether the id has the `<category>.<object>` shape.
    pub fn is_qualified(&self) -> bool {
        matches!(
            self.0.split_once(SEPARATOR),
            Some((category, object)) if !category.is_empty() && !object.is_empty()
        )
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for EntityId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id = Self(s.trim().to_owned());
        if id.is_qualified() && !id.0.contains(char::is_whitespace) {
            Ok(id)
        } else {
            Err(CoreError::InvalidEntityId {
                value: s.to_owned(),
            })
        }
    }
}

impl From<String> for EntityId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl AsRef<str> for EntityId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
