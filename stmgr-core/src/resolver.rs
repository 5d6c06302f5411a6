//! Transition resolution.
//!
//! A transition matches when its source state equals the current state, its
//! operation equals the requested one and its conditions pass. Exact source
//! matches are always tried before wildcard (`*`) transitions; among equally
//! eligible candidates declaration order wins.

use crate::condition::ConditionEvaluator;
use crate::definition::{Transition, WILDCARD_STATE};
use crate::entity::Entity;
use crate::error::CoreError;

/// Whether wildcard transitions may be used when no exact match exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wildcard {
    Allow,
    Deny,
}

/// Finds the transition taken by `operation` from `current_state`.
pub fn find_transition<'t>(
    evaluator: &ConditionEvaluator,
    entity: &Entity,
    transitions: &'t [Transition],
    current_state: &str,
    operation: &str,
    wildcard: Wildcard,
) -> Result<Option<&'t Transition>, CoreError> {
    if let Some(t) = scan(evaluator, entity, transitions, current_state, operation)? {
        return Ok(Some(t));
    }

    if wildcard == Wildcard::Allow && current_state != WILDCARD_STATE {
        if let Some(t) = scan(evaluator, entity, transitions, WILDCARD_STATE, operation)? {
            tracing::trace!(
                "Operation '{}' on entity {} resolved through wildcard transition",
                operation,
                entity.id
            );
            return Ok(Some(t));
        }
    }

    Ok(None)
}

fn scan<'t>(
    evaluator: &ConditionEvaluator,
    entity: &Entity,
    transitions: &'t [Transition],
    from_state: &str,
    operation: &str,
) -> Result<Option<&'t Transition>, CoreError> {
    for t in transitions {
        if t.from_state != from_state || t.operation != operation {
            continue;
        }
        if evaluator.check(entity, t)? {
            return Ok(Some(t));
        }
        tracing::trace!(
            "Transition '{}' -> '{}' on '{}' rejected by conditions",
            t.from_state,
            t.to_state,
            t.operation
        );
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::Condition;

    fn transitions() -> Vec<Transition> {
        vec![
            Transition::new("*", "close", "cancelled"),
            Transition::new("draft", "submit", "review")
                .with_condition(Condition::property("owner", "alice")),
            Transition::new("draft", "submit", "rejected"),
            Transition::new("draft", "close", "closed"),
            Transition::new("*", "archive", "archived"),
        ]
    }

    #[test]
    fn test_exact_match() {
        let eval = ConditionEvaluator::default();
        let entity = Entity::new("e", "doc").with_property("owner", "alice");
        let ts = transitions();

        let t = find_transition(&eval, &entity, &ts, "draft", "submit", Wildcard::Allow)
            .unwrap()
            .unwrap();
        assert_eq!(t.to_state, "review");
    }

    #[test]
    fn test_declaration_order_breaks_ties() {
        let eval = ConditionEvaluator::default();
        let entity = Entity::new("e", "doc").with_property("owner", "bob");
        let ts = transitions();

        // Guarded edge fails, next eligible edge in order is taken.
        let t = find_transition(&eval, &entity, &ts, "draft", "submit", Wildcard::Allow)
            .unwrap()
            .unwrap();
        assert_eq!(t.to_state, "rejected");
    }

    #[test]
    fn test_exact_outranks_wildcard() {
        let eval = ConditionEvaluator::default();
        let entity = Entity::new("e", "doc");
        let ts = transitions();

        let t = find_transition(&eval, &entity, &ts, "draft", "close", Wildcard::Allow)
            .unwrap()
            .unwrap();
        assert_eq!(t.to_state, "closed");

        let t = find_transition(&eval, &entity, &ts, "review", "close", Wildcard::Allow)
            .unwrap()
            .unwrap();
        assert_eq!(t.to_state, "cancelled");
    }

    #[test]
    fn test_wildcard_denied() {
        let eval = ConditionEvaluator::default();
        let entity = Entity::new("e", "doc");
        let ts = transitions();

        let t = find_transition(&eval, &entity, &ts, "review", "archive", Wildcard::Deny).unwrap();
        assert!(t.is_none());
        let t = find_transition(&eval, &entity, &ts, "review", "archive", Wildcard::Allow).unwrap();
        assert_eq!(t.unwrap().to_state, "archived");
    }

    #[test]
    fn test_unknown_operation() {
        let eval = ConditionEvaluator::default();
        let entity = Entity::new("e", "doc");
        let ts = transitions();

        let t = find_transition(&eval, &entity, &ts, "draft", "explode", Wildcard::Allow).unwrap();
        assert!(t.is_none());
    }
}
