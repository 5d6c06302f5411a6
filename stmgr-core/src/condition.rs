//! Condition evaluation.
//!
//! Transitions are guarded by `PROPERTY` conditions. Each one names an entity
//! property (the condition identifier) and an expected value (the
//! expression). A transition passes when it has no `PROPERTY` conditions or
//! when at least one of them matches.
//!
//! Matching rules, applied recursively:
//!
//! - property and expression both blank - match
//! - exactly one blank - no match
//! - property is an array - match if any element matches
//! - property is an object - resource identity comparison
//! - otherwise the expression is converted to the property's kind and the
//!   two values compared; a failed conversion is a non-match
//!
//! `REQUIRED_FIELDS` conditions list field names as bracketed tokens, e.g.
//! `[title][owner]`. [`field_tokens`] extracts them. Tokens inside nested or
//! unbalanced brackets are dropped rather than repaired.

use crate::collaborator::{
    IdentityComparator, JsonTypeConverter, ResourceIdComparator, TypeConverter, ValueKind,
};
use crate::definition::{Condition, RenderAs, Transition};
use crate::entity::Entity;
use crate::error::CoreError;
use indexmap::IndexSet;
use serde_json::Value;
use std::sync::Arc;

/// Evaluates `PROPERTY` conditions against entity data.
#[derive(Clone)]
pub struct ConditionEvaluator {
    converter: Arc<dyn TypeConverter>,
    identity: Arc<dyn IdentityComparator>,
}

impl Default for ConditionEvaluator {
    fn default() -> Self {
        Self::new(Arc::new(JsonTypeConverter), Arc::new(ResourceIdComparator))
    }
}

impl ConditionEvaluator {
    pub fn new(converter: Arc<dyn TypeConverter>, identity: Arc<dyn IdentityComparator>) -> Self {
        Self {
            converter,
            identity,
        }
    }

    pub fn with_converter(mut self, converter: Arc<dyn TypeConverter>) -> Self {
        self.converter = converter;
        self
    }

    pub fn with_identity_comparator(mut self, identity: Arc<dyn IdentityComparator>) -> Self {
        self.identity = identity;
        self
    }

    /// Returns true if the entity satisfies the transition's guards.
    pub fn check(&self, entity: &Entity, transition: &Transition) -> Result<bool, CoreError> {
        self.check_all(entity, &transition.conditions)
    }

    /// Evaluates a condition list with the transition guard semantics.
    pub fn check_all(&self, entity: &Entity, conditions: &[Condition]) -> Result<bool, CoreError> {
        if conditions.is_empty() {
            return Ok(true);
        }

        let mut guarded = false;
        for condition in conditions.iter().filter(|c| c.render_as == RenderAs::Property) {
            guarded = true;
            let value = entity
                .property(&condition.identifier)
                .unwrap_or(&Value::Null);
            if self.matches(value, &condition.expression)? {
                return Ok(true);
            }
        }

        Ok(!guarded)
    }

    /// Compares a property value with a condition expression.
    pub fn matches(&self, value: &Value, expression: &str) -> Result<bool, CoreError> {
        let value_blank = is_blank(value);
        let expression_blank = expression.trim().is_empty();
        if value_blank || expression_blank {
            return Ok(value_blank && expression_blank);
        }

        match value {
            Value::Array(items) => {
                for item in items {
                    if self.matches(item, expression)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Value::Object(_) => Ok(self.identity.are_equal(value, expression)?),
            _ => {
                let Some(kind) = ValueKind::of(value) else {
                    return Ok(false);
                };
                match self.converter.convert(kind, expression) {
                    Ok(expected) => Ok(values_equal(value, &expected)),
                    Err(e) => {
                        tracing::debug!("Condition value treated as non-match: {}", e);
                        Ok(false)
                    }
                }
            }
        }
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        // Integers compare by value, floats with ==; no tolerance.
        (Value::Number(a), Value::Number(b)) => a == b,
        (Value::String(a), Value::String(b)) => a == b,
        _ => false,
    }
}

/// Collects bracketed field tokens from every `REQUIRED_FIELDS` condition.
pub fn collect_required_fields<'a>(
    conditions: impl IntoIterator<Item = &'a Condition>,
    fields: &mut IndexSet<String>,
) {
    for condition in conditions {
        if condition.render_as == RenderAs::RequiredFields {
            fields.extend(field_tokens(&condition.expression).map(str::to_string));
        }
    }
}

/// Returns the `[identifier]` tokens of an expression, in order.
pub fn field_tokens(expression: &str) -> FieldTokens<'_> {
    FieldTokens {
        input: expression,
        chars: expression.char_indices(),
    }
}

/// Iterator over the field tokens of an expression.
pub struct FieldTokens<'a> {
    input: &'a str,
    chars: std::str::CharIndices<'a>,
}

impl<'a> Iterator for FieldTokens<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        let mut depth = 0usize;
        let mut start = 0usize;
        let mut nested = false;

        for (pos, c) in self.chars.by_ref() {
            match c {
                '[' => {
                    if depth == 0 {
                        start = pos + 1;
                        nested = false;
                    } else {
                        nested = true;
                    }
                    depth += 1;
                }
                ']' if depth > 0 => {
                    depth -= 1;
                    if depth == 0 && !nested {
                        let token = self.input[start..pos].trim();
                        if is_field_name(token) {
                            return Some(token);
                        }
                    }
                }
                _ => {}
            }
        }

        None
    }
}

fn is_field_name(token: &str) -> bool {
    !token.is_empty()
        && token
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | ':' | '.'))
}
