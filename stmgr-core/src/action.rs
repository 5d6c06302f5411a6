//! Allowed operations and actions.

use crate::collaborator::ActionFilter;
use crate::condition::ConditionEvaluator;
use crate::definition::{Condition, StateTransitionModel, Transition, TransitionDefinition};
use crate::entity::Entity;
use crate::error::CoreError;
use indexmap::IndexSet;
use serde::Serialize;
use std::hash::{Hash, Hasher};

/// An invocable action, detached from the definition it was built from.
///
/// Actions are plain values with read-only accessors. Two actions are equal
/// when their identifiers are equal.
#[derive(Debug, Clone, Serialize)]
pub struct Action {
    identifier: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tooltip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    purpose: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    order: Option<i32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    conditions: Vec<Condition>,
}

impl Action {
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn tooltip(&self) -> Option<&str> {
        self.tooltip.as_deref()
    }

    pub fn purpose(&self) -> Option<&str> {
        self.purpose.as_deref()
    }

    pub fn group(&self) -> Option<&str> {
        self.group.as_deref()
    }

    pub fn order(&self) -> Option<i32> {
        self.order
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }
}

impl From<&TransitionDefinition> for Action {
    fn from(definition: &TransitionDefinition) -> Self {
        Self {
            identifier: definition.identifier.clone(),
            label: definition.label.clone(),
            tooltip: definition.tooltip.clone(),
            purpose: definition.purpose.clone(),
            group: definition.group.clone(),
            order: definition.order,
            conditions: definition.conditions.clone(),
        }
    }
}

impl PartialEq for Action {
    fn eq(&self, other: &Self) -> bool {
        self.identifier == other.identifier
    }
}

impl Eq for Action {}

impl Hash for Action {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identifier.hash(state);
    }
}

/// Operation ids of transitions leaving `current_state` whose conditions pass.
pub fn allowed_operations(
    evaluator: &ConditionEvaluator,
    entity: &Entity,
    transitions: &[Transition],
    current_state: &str,
) -> Result<IndexSet<String>, CoreError> {
    operations_where(evaluator, entity, transitions, |t| {
        t.from_state == current_state
    })
}

fn operations_where(
    evaluator: &ConditionEvaluator,
    entity: &Entity,
    transitions: &[Transition],
    eligible: impl Fn(&Transition) -> bool,
) -> Result<IndexSet<String>, CoreError> {
    let mut operations = IndexSet::new();
    for t in transitions {
        if operations.contains(&t.operation) || !eligible(t) {
            continue;
        }
        if evaluator.check(entity, t)? {
            operations.insert(t.operation.clone());
        }
    }
    Ok(operations)
}

/// Inputs to [`allowed_actions`].
pub struct ActionQuery<'a> {
    pub entity: &'a Entity,
    pub model: &'a StateTransitionModel,
    /// Static and dynamic transitions merged.
    pub transitions: &'a [Transition],
    pub current_state: Option<&'a str>,
    pub restrict_to: Option<&'a IndexSet<String>>,
}

/// Computes the actions an entity may invoke.
///
/// - No restriction and no current state: every transition whose conditions
///   pass contributes its operation, whatever its source state.
/// - No restriction and a model without transitions: every action is
///   allowed.
/// - A restriction without a current state: an action is allowed only if
///   the restriction names it and some transition for it passes its
///   conditions.
/// - Otherwise: the action's operation must be allowed from the current
///   state and named by the restriction, if one is given.
pub fn allowed_actions(
    evaluator: &ConditionEvaluator,
    filter: &dyn ActionFilter,
    query: ActionQuery<'_>,
) -> Result<IndexSet<Action>, CoreError> {
    let ActionQuery {
        entity,
        model,
        transitions,
        current_state,
        restrict_to,
    } = query;

    let allowed_ops = match current_state {
        Some(state) => allowed_operations(evaluator, entity, transitions, state)?,
        None => operations_where(evaluator, entity, transitions, |_| true)?,
    };
    let allow_all = restrict_to.is_none() && model.transitions.is_empty();

    let actions = model
        .definitions
        .iter()
        .filter(|d| filter.is_action(d))
        .filter(|d| {
            let id = &d.identifier;
            allow_all
                || (allowed_ops.contains(id) && restrict_to.map_or(true, |r| r.contains(id)))
        })
        .map(Action::from)
        .collect();

    Ok(actions)
}

/// Every target state declared by the static transitions.
pub fn allowed_states(model: &StateTransitionModel) -> IndexSet<String> {
    model
        .transitions
        .iter()
        .map(|t| t.to_state.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborator::PurposeActionFilter;

    fn model() -> StateTransitionModel {
        StateTransitionModel::new()
            .with_transition(
                Transition::new("draft", "submit", "review")
                    .with_condition(Condition::property("owner", "alice")),
            )
            .with_transition(Transition::new("draft", "edit", "draft"))
            .with_transition(Transition::new("review", "approve", "approved"))
            .with_transition(Transition::new("*", "close", "closed"))
            .with_definition(TransitionDefinition::new("submit").with_label("Submit"))
            .with_definition(TransitionDefinition::new("edit"))
            .with_definition(TransitionDefinition::new("approve"))
            .with_definition(TransitionDefinition::new("close"))
            .with_definition(TransitionDefinition::new("start").with_purpose("transition"))
    }

    fn ids(actions: &IndexSet<Action>) -> Vec<&str> {
        actions.iter().map(Action::identifier).collect()
    }

    fn query<'a>(
        entity: &'a Entity,
        model: &'a StateTransitionModel,
        current_state: Option<&'a str>,
        restrict_to: Option<&'a IndexSet<String>>,
    ) -> ActionQuery<'a> {
        ActionQuery {
            entity,
            model,
            transitions: &model.transitions,
            current_state,
            restrict_to,
        }
    }

    #[test]
    fn test_allowed_operations() {
        let eval = ConditionEvaluator::default();
        let model = model();
        let alice = Entity::new("e", "doc").with_property("owner", "alice");
        let bob = Entity::new("e", "doc").with_property("owner", "bob");

        let ops = allowed_operations(&eval, &alice, &model.transitions, "draft").unwrap();
        assert_eq!(ops.into_iter().collect::<Vec<_>>(), vec!["submit", "edit"]);

        let ops = allowed_operations(&eval, &bob, &model.transitions, "draft").unwrap();
        assert_eq!(ops.into_iter().collect::<Vec<_>>(), vec!["edit"]);
    }

    #[test]
    fn test_actions_for_state() {
        let eval = ConditionEvaluator::default();
        let model = model();
        let alice = Entity::new("e", "doc").with_property("owner", "alice");

        let actions =
            allowed_actions(&eval, &PurposeActionFilter, query(&alice, &model, Some("draft"), None))
                .unwrap();
        assert_eq!(ids(&actions), vec!["submit", "edit"]);
        assert_eq!(actions[0].label(), Some("Submit"));
    }

    #[test]
    fn test_actions_restricted() {
        let eval = ConditionEvaluator::default();
        let model = model();
        let alice = Entity::new("e", "doc").with_property("owner", "alice");
        let restrict: IndexSet<String> = ["edit".to_string(), "approve".to_string()].into();

        let actions = allowed_actions(
            &eval,
            &PurposeActionFilter,
            query(&alice, &model, Some("draft"), Some(&restrict)),
        )
        .unwrap();
        assert_eq!(ids(&actions), vec!["edit"]);
    }

    #[test]
    fn test_bootstrap_without_state() {
        let eval = ConditionEvaluator::default();
        let model = model();
        let bob = Entity::new("e", "doc").with_property("owner", "bob");

        let actions =
            allowed_actions(&eval, &PurposeActionFilter, query(&bob, &model, None, None)).unwrap();
        // submit is guarded out for bob; "start" is not an action.
        assert_eq!(ids(&actions), vec!["edit", "approve", "close"]);
    }

    #[test]
    fn test_restriction_without_state_fails_closed() {
        let eval = ConditionEvaluator::default();
        let model = model();
        let bob = Entity::new("e", "doc").with_property("owner", "bob");
        let restrict: IndexSet<String> =
            ["submit".to_string(), "approve".to_string(), "missing".to_string()].into();

        let actions = allowed_actions(
            &eval,
            &PurposeActionFilter,
            query(&bob, &model, None, Some(&restrict)),
        )
        .unwrap();
        assert_eq!(ids(&actions), vec!["approve"]);
    }

    #[test]
    fn test_model_without_transitions_allows_all() {
        let eval = ConditionEvaluator::default();
        let model = StateTransitionModel::new()
            .with_definition(TransitionDefinition::new("print"))
            .with_definition(TransitionDefinition::new("export"));
        let entity = Entity::new("e", "doc");

        let actions = allowed_actions(
            &eval,
            &PurposeActionFilter,
            query(&entity, &model, Some("anything"), None),
        )
        .unwrap();
        assert_eq!(ids(&actions), vec!["print", "export"]);

        let restrict: IndexSet<String> = ["print".to_string()].into();
        let actions = allowed_actions(
            &eval,
            &PurposeActionFilter,
            query(&entity, &model, Some("anything"), Some(&restrict)),
        )
        .unwrap();
        assert!(actions.is_empty());
    }

    #[test]
    fn test_action_is_detached_copy() {
        let mut definition = TransitionDefinition::new("submit").with_label("Submit");
        let action = Action::from(&definition);
        definition.label = Some("Changed".to_string());
        assert_eq!(action.label(), Some("Submit"));
    }

    #[test]
    fn test_allowed_states() {
        let states = allowed_states(&model());
        assert_eq!(
            states.into_iter().collect::<Vec<_>>(),
            vec!["review", "draft", "approved", "closed"]
        );
    }
}
