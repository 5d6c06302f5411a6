//! Definition model types.
//!
//! A definition model describes one entity type. Types that take part in
//! lifecycle management carry a `state_transitions` block:
//!
//! ```yaml
//! identifier: document
//! state_transitions:
//!   transitions:
//!     - from: draft
//!       operation: submit
//!       to: review
//!       conditions:
//!         - identifier: owner
//!           expression: alice
//!           render_as: PROPERTY
//!     - from: [review, approved]
//!       operation: reopen
//!       to: draft
//!     - from: "*"
//!       operation: close
//!       to: closed
//!   definitions:
//!     - identifier: submit
//!       label: Submit for review
//!   groups:
//!     - identifier: lifecycle
//! ```
//!
//! Models without the block are unmanaged: the engine answers every query
//! about them with an empty result.

use crate::error::CoreError;
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Source state matching any current state.
pub const WILDCARD_STATE: &str = "*";

/// How a condition is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderAs {
    /// Equality guard against a live entity property.
    Property,
    /// Expression listing `[field]` tokens that must be populated.
    RequiredFields,
    /// Opaque expression evaluated by an external UI rules layer.
    DisableSave,
    Mandatory,
    Optional,
    /// Any tag the engine does not interpret.
    Other,
}

impl RenderAs {
    /// Parses a tag, ignoring ASCII case.
    pub fn parse(tag: &str) -> Self {
        let tag = tag.trim();
        if tag.eq_ignore_ascii_case("PROPERTY") {
            RenderAs::Property
        } else if tag.eq_ignore_ascii_case("REQUIRED_FIELDS") {
            RenderAs::RequiredFields
        } else if tag.eq_ignore_ascii_case("DISABLE_SAVE") {
            RenderAs::DisableSave
        } else if tag.eq_ignore_ascii_case("MANDATORY") {
            RenderAs::Mandatory
        } else if tag.eq_ignore_ascii_case("OPTIONAL") {
            RenderAs::Optional
        } else {
            RenderAs::Other
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RenderAs::Property => "PROPERTY",
            RenderAs::RequiredFields => "REQUIRED_FIELDS",
            RenderAs::DisableSave => "DISABLE_SAVE",
            RenderAs::Mandatory => "MANDATORY",
            RenderAs::Optional => "OPTIONAL",
            RenderAs::Other => "OTHER",
        }
    }
}

impl fmt::Display for RenderAs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for RenderAs {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for RenderAs {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        Ok(RenderAs::parse(&tag))
    }
}

/// A condition attached to a transition or transition definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Condition {
    /// Property name for `PROPERTY` guards, free identifier otherwise.
    pub identifier: String,

    #[serde(default)]
    pub expression: String,

    #[serde(alias = "renderAs")]
    pub render_as: RenderAs,
}

impl Condition {
    pub fn new(
        identifier: impl Into<String>,
        expression: impl Into<String>,
        render_as: RenderAs,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            expression: expression.into(),
            render_as,
        }
    }

    /// A `PROPERTY` guard requiring `property` to equal `value`.
    pub fn property(property: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(property, value, RenderAs::Property)
    }

    /// A `REQUIRED_FIELDS` condition, e.g. `"[title][owner]"`.
    pub fn required_fields(identifier: impl Into<String>, expression: impl Into<String>) -> Self {
        Self::new(identifier, expression, RenderAs::RequiredFields)
    }

    /// A `DISABLE_SAVE` condition carrying an opaque UI expression.
    pub fn disable_save(identifier: impl Into<String>, expression: impl Into<String>) -> Self {
        Self::new(identifier, expression, RenderAs::DisableSave)
    }
}

/// Identity of a transition: `(from, operation, to)`.
pub type TransitionKey<'a> = (&'a str, &'a str, &'a str);

/// A directed, optionally guarded edge between two states.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    /// Source state, or `*` for any state.
    #[serde(rename = "from")]
    pub from_state: String,

    /// Operation that triggers this transition.
    pub operation: String,

    /// Target state.
    #[serde(rename = "to")]
    pub to_state: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

impl Transition {
    pub fn new(
        from_state: impl Into<String>,
        operation: impl Into<String>,
        to_state: impl Into<String>,
    ) -> Self {
        Self {
            from_state: from_state.into(),
            operation: operation.into(),
            to_state: to_state.into(),
            conditions: Vec::new(),
        }
    }

    /// Adds a condition to the transition.
    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Returns true if this transition applies from any state.
    pub fn is_wildcard(&self) -> bool {
        self.from_state == WILDCARD_STATE
    }

    pub fn key(&self) -> TransitionKey<'_> {
        (&self.from_state, &self.operation, &self.to_state)
    }

    /// Returns the conditions carrying the given tag.
    pub fn conditions_tagged(&self, tag: RenderAs) -> impl Iterator<Item = &Condition> {
        self.conditions.iter().filter(move |c| c.render_as == tag)
    }
}

/// A user-invocable operation definition.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TransitionDefinition {
    /// Operation identifier; matches `Transition::operation`.
    pub identifier: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tooltip: Option<String>,

    /// Free-form purpose, used by the action filter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,

    /// Transition group this definition is displayed under.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i32>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

impl TransitionDefinition {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            ..Default::default()
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_purpose(mut self, purpose: impl Into<String>) -> Self {
        self.purpose = Some(purpose.into());
        self
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }
}

/// A named group used to arrange actions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionGroup {
    pub identifier: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i32>,

    #[serde(
        rename = "type",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub group_type: Option<String>,
}

impl TransitionGroup {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            label: None,
            parent: None,
            order: None,
            group_type: None,
        }
    }
}

/// The state-transition capability of a definition model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateTransitionModel {
    /// Transitions in declaration order. A source list in the serialized
    /// form expands to one transition per source state.
    #[serde(default, deserialize_with = "deserialize_transitions")]
    pub transitions: Vec<Transition>,

    #[serde(default, alias = "transition_definitions")]
    pub definitions: Vec<TransitionDefinition>,

    #[serde(default, alias = "transition_groups")]
    pub groups: Vec<TransitionGroup>,
}

impl StateTransitionModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_transition(mut self, transition: Transition) -> Self {
        self.transitions.push(transition);
        self
    }

    pub fn with_definition(mut self, definition: TransitionDefinition) -> Self {
        self.definitions.push(definition);
        self
    }

    pub fn with_group(mut self, group: TransitionGroup) -> Self {
        self.groups.push(group);
        self
    }

    /// Orders transitions for resolution and drops redundant ones.
    ///
    /// Transitions sharing a source state and operation are gathered at the
    /// position of the first one declared. Within each such group the
    /// transitions carrying conditions come first, in declaration order,
    /// followed by the unconditional ones, of which only the first per
    /// target state is kept. Returns the number of transitions removed.
    pub fn optimize_transitions(&mut self) -> usize {
        let before = self.transitions.len();

        let mut groups: IndexMap<(String, String), (Vec<Transition>, IndexMap<String, Transition>)> =
            IndexMap::new();
        for t in std::mem::take(&mut self.transitions) {
            let (guarded, unguarded) = groups
                .entry((t.from_state.clone(), t.operation.clone()))
                .or_default();
            if t.conditions.is_empty() {
                unguarded.entry(t.to_state.clone()).or_insert(t);
            } else {
                guarded.push(t);
            }
        }

        self.transitions = groups
            .into_values()
            .flat_map(|(guarded, unguarded)| guarded.into_iter().chain(unguarded.into_values()))
            .collect();

        before - self.transitions.len()
    }

    /// Returns every definition with the given identifier.
    pub fn definitions_for<'a>(
        &'a self,
        operation: &'a str,
    ) -> impl Iterator<Item = &'a TransitionDefinition> + 'a {
        self.definitions
            .iter()
            .filter(move |d| d.identifier == operation)
    }
}

/// Serialized transition; `from` may be a single state or a list.
#[derive(Deserialize)]
struct TransitionSpec {
    #[serde(deserialize_with = "deserialize_from_states")]
    from: Vec<String>,
    operation: String,
    to: String,
    #[serde(default)]
    conditions: Vec<Condition>,
}

fn deserialize_transitions<'de, D>(deserializer: D) -> Result<Vec<Transition>, D::Error>
where
    D: Deserializer<'de>,
{
    let specs = Vec::<TransitionSpec>::deserialize(deserializer)?;
    let mut transitions = Vec::with_capacity(specs.len());
    for spec in specs {
        for from in spec.from {
            transitions.push(Transition {
                from_state: from,
                operation: spec.operation.clone(),
                to_state: spec.to.clone(),
                conditions: spec.conditions.clone(),
            });
        }
    }
    Ok(transitions)
}

fn deserialize_from_states<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::{self, Visitor};

    struct FromStatesVisitor;

    impl<'de> Visitor<'de> for FromStatesVisitor {
        type Value = Vec<String>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a state name or a list of state names")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(vec![v.to_string()])
        }

        fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
        where
            A: de::SeqAccess<'de>,
        {
            let mut states = Vec::new();
            while let Some(s) = seq.next_element::<String>()? {
                states.push(s);
            }
            Ok(states)
        }
    }

    deserializer.deserialize_any(FromStatesVisitor)
}

/// Static configuration for one entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefinitionModel {
    pub identifier: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    state_transitions: Option<StateTransitionModel>,
}

impl DefinitionModel {
    /// Creates a model without lifecycle management.
    pub fn unmanaged(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            state_transitions: None,
        }
    }

    /// Creates a model with the given state-transition capability.
    pub fn managed(identifier: impl Into<String>, model: StateTransitionModel) -> Self {
        Self {
            identifier: identifier.into(),
            state_transitions: Some(model),
        }
    }

    /// Returns the state-transition capability, if the model has one.
    pub fn state_transitions(&self) -> Option<&StateTransitionModel> {
        self.state_transitions.as_ref()
    }

    /// Parses, validates and optimizes a definition model from JSON.
    pub fn from_json(json: &serde_json::Value) -> Result<Self, CoreError> {
        let mut model: DefinitionModel = serde_json::from_value(json.clone())?;
        model.validate()?;
        model.optimize();
        Ok(model)
    }

    /// Parses, validates and optimizes a definition model from YAML text.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, CoreError> {
        let mut model: DefinitionModel = serde_yaml::from_str(yaml)?;
        model.validate()?;
        model.optimize();
        Ok(model)
    }

    /// Applies [`StateTransitionModel::optimize_transitions`] to the
    /// state-transition capability, if any.
    pub fn optimize(&mut self) {
        if let Some(model) = &mut self.state_transitions {
            let removed = model.optimize_transitions();
            if removed > 0 {
                tracing::debug!(
                    "Removed {} duplicate transition(s) from [{}]",
                    removed,
                    self.identifier
                );
            }
        }
    }

    /// Checks the structural rules a model must satisfy to be loaded.
    pub fn validate(&self) -> Result<(), CoreError> {
        let Some(model) = &self.state_transitions else {
            return Ok(());
        };

        for t in &model.transitions {
            if t.from_state.trim().is_empty() {
                return Err(self.invalid(format!(
                    "transition '{}' has an empty source state",
                    t.operation
                )));
            }
            if t.operation.trim().is_empty() {
                return Err(self.invalid(format!(
                    "transition from '{}' has an empty operation",
                    t.from_state
                )));
            }
            if t.to_state.trim().is_empty() {
                return Err(self.invalid(format!(
                    "transition '{}' from '{}' has an empty target state",
                    t.operation, t.from_state
                )));
            }
            if t.to_state == WILDCARD_STATE {
                return Err(self.invalid(format!(
                    "transition '{}' from '{}' targets the wildcard state",
                    t.operation, t.from_state
                )));
            }
        }

        if model.definitions.iter().any(|d| d.identifier.trim().is_empty()) {
            return Err(self.invalid("transition definition with empty identifier".to_string()));
        }

        let mut seen = IndexSet::new();
        for g in &model.groups {
            if !seen.insert(g.identifier.as_str()) {
                return Err(self.invalid(format!(
                    "duplicate transition group '{}'",
                    g.identifier
                )));
            }
        }

        Ok(())
    }

    fn invalid(&self, reason: String) -> CoreError {
        CoreError::InvalidDefinition {
            definition: self.identifier.clone(),
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_definition() -> serde_json::Value {
        serde_json::json!({
            "identifier": "document",
            "state_transitions": {
                "transitions": [
                    {"from": "draft", "operation": "submit", "to": "review",
                     "conditions": [{"identifier": "owner", "expression": "alice", "render_as": "PROPERTY"}]},
                    {"from": ["review", "approved"], "operation": "reopen", "to": "draft"},
                    {"from": "*", "operation": "close", "to": "closed"}
                ],
                "definitions": [
                    {"identifier": "submit", "label": "Submit"},
                    {"identifier": "reopen"}
                ],
                "groups": [{"identifier": "lifecycle", "type": "menu"}]
            }
        })
    }

    #[test]
    fn test_parse_definition() {
        let def = DefinitionModel::from_json(&sample_definition()).unwrap();
        assert_eq!(def.identifier, "document");

        let model = def.state_transitions().unwrap();
        assert_eq!(model.transitions.len(), 4);
        assert_eq!(model.definitions.len(), 2);
        assert_eq!(model.groups[0].group_type.as_deref(), Some("menu"));
    }

    #[test]
    fn test_multi_source_transition_expands() {
        let def = DefinitionModel::from_json(&sample_definition()).unwrap();
        let model = def.state_transitions().unwrap();

        let reopen: Vec<_> = model
            .transitions
            .iter()
            .filter(|t| t.operation == "reopen")
            .map(|t| t.from_state.as_str())
            .collect();
        assert_eq!(reopen, vec!["review", "approved"]);
    }

    #[test]
    fn test_wildcard_transition() {
        let def = DefinitionModel::from_json(&sample_definition()).unwrap();
        let close = def
            .state_transitions()
            .unwrap()
            .transitions
            .iter()
            .find(|t| t.operation == "close")
            .unwrap();
        assert!(close.is_wildcard());
        assert_eq!(close.key(), ("*", "close", "closed"));
    }

    #[test]
    fn test_guarded_transitions_ordered_first() {
        let json = serde_json::json!({
            "identifier": "document",
            "state_transitions": {
                "transitions": [
                    {"from": "draft", "operation": "submit", "to": "rejected"},
                    {"from": "draft", "operation": "edit", "to": "draft"},
                    {"from": "draft", "operation": "submit", "to": "review",
                     "conditions": [{"identifier": "owner", "expression": "alice", "render_as": "PROPERTY"}]},
                    {"from": "draft", "operation": "submit", "to": "rejected"},
                    {"from": "draft", "operation": "submit", "to": "parked"},
                    {"from": "draft", "operation": "submit", "to": "escalated",
                     "conditions": [{"identifier": "owner", "expression": "bob", "render_as": "PROPERTY"}]}
                ]
            }
        });
        let def = DefinitionModel::from_json(&json).unwrap();
        let keys: Vec<_> = def
            .state_transitions()
            .unwrap()
            .transitions
            .iter()
            .map(Transition::key)
            .collect();
        assert_eq!(
            keys,
            vec![
                ("draft", "submit", "review"),
                ("draft", "submit", "escalated"),
                ("draft", "submit", "rejected"),
                ("draft", "submit", "parked"),
                ("draft", "edit", "draft"),
            ]
        );
    }

    #[test]
    fn test_optimize_keeps_guarded_duplicates() {
        let guarded = Transition::new("a", "go", "b").with_condition(Condition::property("x", "1"));
        let mut model = StateTransitionModel::new()
            .with_transition(Transition::new("a", "go", "b"))
            .with_transition(guarded.clone())
            .with_transition(guarded.clone())
            .with_transition(Transition::new("a", "go", "b"));

        assert_eq!(model.optimize_transitions(), 1);
        assert_eq!(
            model.transitions,
            vec![guarded.clone(), guarded, Transition::new("a", "go", "b")]
        );
        assert_eq!(model.optimize_transitions(), 0);
    }

    #[test]
    fn test_render_as_is_case_insensitive() {
        assert_eq!(RenderAs::parse("property"), RenderAs::Property);
        assert_eq!(RenderAs::parse("Required_Fields"), RenderAs::RequiredFields);
        assert_eq!(RenderAs::parse("disable_save"), RenderAs::DisableSave);
        assert_eq!(RenderAs::parse("visible"), RenderAs::Other);

        let c: Condition = serde_json::from_value(serde_json::json!({
            "identifier": "x", "expression": "[a]", "renderAs": "required_fields"
        }))
        .unwrap();
        assert_eq!(c.render_as, RenderAs::RequiredFields);
    }

    #[test]
    fn test_unmanaged_model() {
        let def = DefinitionModel::from_json(&serde_json::json!({"identifier": "note"})).unwrap();
        assert!(def.state_transitions().is_none());
    }

    #[test]
    fn test_yaml_definition() {
        let yaml = r#"
identifier: task
state_transitions:
  transitions:
    - from: open
      operation: complete
      to: done
  definitions:
    - identifier: complete
      purpose: action
"#;
        let def = DefinitionModel::from_yaml_str(yaml).unwrap();
        let model = def.state_transitions().unwrap();
        assert_eq!(model.transitions[0].to_state, "done");
        assert_eq!(model.definitions_for("complete").count(), 1);
    }

    #[test]
    fn test_invalid_wildcard_target() {
        let json = serde_json::json!({
            "identifier": "bad",
            "state_transitions": {
                "transitions": [{"from": "a", "operation": "go", "to": "*"}]
            }
        });
        let result = DefinitionModel::from_json(&json);
        assert!(matches!(result, Err(CoreError::InvalidDefinition { .. })));
    }

    #[test]
    fn test_invalid_empty_operation() {
        let json = serde_json::json!({
            "identifier": "bad",
            "state_transitions": {
                "transitions": [{"from": "a", "operation": " ", "to": "b"}]
            }
        });
        let result = DefinitionModel::from_json(&json);
        assert!(matches!(result, Err(CoreError::InvalidDefinition { .. })));
    }

    #[test]
    fn test_duplicate_group() {
        let json = serde_json::json!({
            "identifier": "bad",
            "state_transitions": {
                "groups": [{"identifier": "g"}, {"identifier": "g"}]
            }
        });
        let result = DefinitionModel::from_json(&json);
        assert!(matches!(result, Err(CoreError::InvalidDefinition { .. })));
    }
}
