//! Entities evaluated by the engine.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Property conventionally holding an entity's current state.
pub const DEFAULT_STATE_PROPERTY: &str = "status";

/// A domain object governed by a definition model.
///
/// The engine only reads entities; it never changes their properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Unique entity ID.
    pub id: String,

    /// Identifier of the definition model governing this entity.
    pub definition: String,

    /// Category used to look up the initial state.
    #[serde(default)]
    pub category: String,

    /// Live property values.
    #[serde(default)]
    properties: Map<String, Value>,
}

impl Entity {
    pub fn new(id: impl Into<String>, definition: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            definition: definition.into(),
            category: String::new(),
            properties: Map::new(),
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    /// Sets a property value while building the entity.
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    /// Returns the value of a property, if present.
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    pub fn properties(&self) -> &Map<String, Value> {
        &self.properties
    }

    /// Reads the current state from the given property.
    ///
    /// Returns `None` when the property is missing, not a string, or blank.
    pub fn state(&self, property: &str) -> Option<&str> {
        self.property(property)
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
    }
}
