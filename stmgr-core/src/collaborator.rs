//! Contracts the engine consumes, plus reference implementations.
//!
//! Everything that may block or fail (looking up definitions, resolving
//! entities, initial states) sits behind one of these traits. Failures are
//! returned as [`BoxError`] and reach the caller unchanged.

use crate::definition::{DefinitionModel, TransitionDefinition};
use crate::entity::Entity;
use crate::error::{BoxError, ConversionError};
use serde_json::{Number, Value};
use std::sync::Arc;

/// Looks up the definition model governing an entity.
pub trait DefinitionService: Send + Sync {
    /// Returns `None` when no model is registered for the entity's type.
    fn definition_for(&self, entity: &Entity) -> Result<Option<Arc<DefinitionModel>>, BoxError>;
}

/// Looks up the initial state for an entity category.
pub trait InitialStateProvider: Send + Sync {
    fn initial_state(&self, category: &str) -> Result<Option<String>, BoxError>;
}

/// Resolves entities by id.
pub trait EntityResolver: Send + Sync {
    fn resolve(&self, id: &str) -> Result<Option<Entity>, BoxError>;
}

/// Runtime kind of a scalar property value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Text,
    Boolean,
    Integer,
    Float,
}

impl ValueKind {
    /// Returns the kind of a scalar value; `None` for null, arrays and objects.
    pub fn of(value: &Value) -> Option<Self> {
        match value {
            Value::String(_) => Some(ValueKind::Text),
            Value::Bool(_) => Some(ValueKind::Boolean),
            Value::Number(n) if n.is_f64() => Some(ValueKind::Float),
            Value::Number(_) => Some(ValueKind::Integer),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ValueKind::Text => "text",
            ValueKind::Boolean => "boolean",
            ValueKind::Integer => "integer",
            ValueKind::Float => "float",
        }
    }
}

/// Converts condition expressions into typed values.
pub trait TypeConverter: Send + Sync {
    fn convert(&self, target: ValueKind, raw: &str) -> Result<Value, ConversionError>;
}

/// Compares resource-like property values against an expression.
pub trait IdentityComparator: Send + Sync {
    fn are_equal(&self, value: &Value, expression: &str) -> Result<bool, BoxError>;
}

/// Decides which transition definitions are user-invocable actions.
pub trait ActionFilter: Send + Sync {
    fn is_action(&self, definition: &TransitionDefinition) -> bool;
}

/// Parses expressions as JSON scalars of the requested kind.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonTypeConverter;

impl TypeConverter for JsonTypeConverter {
    fn convert(&self, target: ValueKind, raw: &str) -> Result<Value, ConversionError> {
        let err = || ConversionError {
            target: target.as_str(),
            raw: raw.to_string(),
        };
        let trimmed = raw.trim();

        match target {
            ValueKind::Text => Ok(Value::String(raw.to_string())),
            ValueKind::Boolean => {
                if trimmed.eq_ignore_ascii_case("true") {
                    Ok(Value::Bool(true))
                } else if trimmed.eq_ignore_ascii_case("false") {
                    Ok(Value::Bool(false))
                } else {
                    Err(err())
                }
            }
            ValueKind::Integer => {
                if let Ok(n) = trimmed.parse::<i64>() {
                    Ok(Value::from(n))
                } else if let Ok(n) = trimmed.parse::<u64>() {
                    Ok(Value::from(n))
                } else {
                    Err(err())
                }
            }
            ValueKind::Float => trimmed
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .ok_or_else(err),
        }
    }
}

/// Treats JSON objects as resource references identified by `id` or `uri`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResourceIdComparator;

impl IdentityComparator for ResourceIdComparator {
    fn are_equal(&self, value: &Value, expression: &str) -> Result<bool, BoxError> {
        let expected = expression.trim();
        let Value::Object(map) = value else {
            return Ok(false);
        };

        Ok(["id", "uri"]
            .iter()
            .filter_map(|key| map.get(*key).and_then(Value::as_str))
            .any(|id| id == expected))
    }
}

/// Every definition is an action unless its purpose is `transition`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PurposeActionFilter;

impl ActionFilter for PurposeActionFilter {
    fn is_action(&self, definition: &TransitionDefinition) -> bool {
        !definition
            .purpose
            .as_deref()
            .is_some_and(|p| p.trim().eq_ignore_ascii_case("transition"))
    }
}
