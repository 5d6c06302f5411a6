//! Transition manager - answers lifecycle queries about entities.
//!
//! The manager is read-only: it never changes entities or definition models
//! and keeps no state between calls. It can be shared freely across threads.

use crate::action::{self, Action, ActionQuery};
use crate::collaborator::{
    ActionFilter, DefinitionService, EntityResolver, InitialStateProvider, PurposeActionFilter,
};
use crate::condition::{self, ConditionEvaluator};
use crate::definition::{DefinitionModel, RenderAs, StateTransitionModel, TransitionGroup};
use crate::entity::Entity;
use crate::error::CoreError;
use crate::provider::{DynamicTransitionProvider, ProviderRegistry};
use crate::resolver::{self, Wildcard};
use indexmap::IndexSet;
use std::sync::Arc;

/// The state transition manager.
pub struct TransitionManager {
    definitions: Arc<dyn DefinitionService>,
    initial_states: Arc<dyn InitialStateProvider>,
    entities: Arc<dyn EntityResolver>,
    evaluator: ConditionEvaluator,
    action_filter: Arc<dyn ActionFilter>,
    providers: ProviderRegistry,
    wildcard: Wildcard,
}

fn capability(definition: &Option<Arc<DefinitionModel>>) -> Option<&StateTransitionModel> {
    definition
        .as_deref()
        .and_then(DefinitionModel::state_transitions)
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

impl TransitionManager {
    /// Creates a manager with the default condition evaluator and action
    /// filter and no dynamic providers.
    pub fn new(
        definitions: Arc<dyn DefinitionService>,
        initial_states: Arc<dyn InitialStateProvider>,
        entities: Arc<dyn EntityResolver>,
    ) -> Self {
        Self {
            definitions,
            initial_states,
            entities,
            evaluator: ConditionEvaluator::default(),
            action_filter: Arc::new(PurposeActionFilter),
            providers: ProviderRegistry::new(),
            wildcard: Wildcard::Allow,
        }
    }

    /// Registers a dynamic provider after the already registered ones.
    pub fn with_provider(mut self, provider: Arc<dyn DynamicTransitionProvider>) -> Self {
        self.providers = self.providers.with_provider(provider);
        self
    }

    /// Replaces the provider registry.
    pub fn with_providers(mut self, providers: ProviderRegistry) -> Self {
        self.providers = providers;
        self
    }

    pub fn with_evaluator(mut self, evaluator: ConditionEvaluator) -> Self {
        self.evaluator = evaluator;
        self
    }

    pub fn with_action_filter(mut self, filter: Arc<dyn ActionFilter>) -> Self {
        self.action_filter = filter;
        self
    }

    /// Sets whether [`next_state`](Self::next_state) may fall back to
    /// wildcard transitions. Enabled by default.
    pub fn with_wildcard(mut self, wildcard: Wildcard) -> Self {
        self.wildcard = wildcard;
        self
    }

    /// Returns true if the entity's definition model supports state
    /// management.
    pub fn is_state_management_supported(&self, entity: &Entity) -> Result<bool, CoreError> {
        let definition = self.definitions.definition_for(entity)?;
        Ok(capability(&definition).is_some())
    }

    /// Computes the state `operation` leads to.
    ///
    /// A blank `current_state` is replaced by the initial state of the
    /// entity's category. A blank or unknown operation leaves the state
    /// unchanged. Returns `None` for unmanaged entities.
    pub fn next_state(
        &self,
        entity: &Entity,
        current_state: Option<&str>,
        operation: Option<&str>,
    ) -> Result<Option<String>, CoreError> {
        let definition = self.definitions.definition_for(entity)?;
        let Some(model) = capability(&definition) else {
            return Ok(None);
        };

        let state = match non_blank(current_state) {
            Some(state) => Some(state.to_string()),
            None => {
                let initial = self.initial_states.initial_state(&entity.category)?;
                if initial.is_none() {
                    tracing::warn!(
                        "No initial state for category '{}' (entity {})",
                        entity.category,
                        entity.id
                    );
                }
                initial
            }
        };

        let Some(operation) = non_blank(operation) else {
            return Ok(state);
        };

        let transitions = self.providers.extract_transitions(entity, model);
        let found = resolver::find_transition(
            &self.evaluator,
            entity,
            &transitions,
            state.as_deref().unwrap_or_default(),
            operation,
            self.wildcard,
        )?;

        match found {
            Some(t) => {
                tracing::debug!(
                    "Entity {}: '{}' --{}--> '{}'{}",
                    entity.id,
                    state.as_deref().unwrap_or_default(),
                    operation,
                    t.to_state,
                    if t.is_wildcard() { " (wildcard)" } else { "" }
                );
                Ok(Some(t.to_state.clone()))
            }
            None => {
                tracing::debug!(
                    "Entity {}: no transition for '{}' from '{}'",
                    entity.id,
                    operation,
                    state.as_deref().unwrap_or_default()
                );
                Ok(state)
            }
        }
    }

    /// Fields that must be populated before `operation` may be performed.
    ///
    /// Combines the `REQUIRED_FIELDS` tokens of the transition matched from
    /// `current_state` (wildcards excluded) with those of every transition
    /// definition named `operation`.
    pub fn required_fields(
        &self,
        entity: &Entity,
        current_state: Option<&str>,
        operation: &str,
    ) -> Result<IndexSet<String>, CoreError> {
        let mut fields = IndexSet::new();
        let definition = self.definitions.definition_for(entity)?;
        let Some(model) = capability(&definition) else {
            return Ok(fields);
        };

        if let Some(state) = non_blank(current_state) {
            let transitions = self.providers.extract_transitions(entity, model);
            let found = resolver::find_transition(
                &self.evaluator,
                entity,
                &transitions,
                state,
                operation,
                Wildcard::Deny,
            )?;
            if let Some(t) = found {
                condition::collect_required_fields(&t.conditions, &mut fields);
            }
        }

        for declared in model.definitions_for(operation) {
            condition::collect_required_fields(&declared.conditions, &mut fields);
        }

        Ok(fields)
    }

    /// The raw `DISABLE_SAVE` expression of the transition matched from
    /// `current_state` (wildcards excluded), if any.
    pub fn required_fields_expression(
        &self,
        entity: &Entity,
        current_state: Option<&str>,
        operation: &str,
    ) -> Result<Option<String>, CoreError> {
        let definition = self.definitions.definition_for(entity)?;
        let Some(model) = capability(&definition) else {
            return Ok(None);
        };
        let Some(state) = non_blank(current_state) else {
            return Ok(None);
        };

        let transitions = self.providers.extract_transitions(entity, model);
        let found = resolver::find_transition(
            &self.evaluator,
            entity,
            &transitions,
            state,
            operation,
            Wildcard::Deny,
        )?;

        Ok(found.and_then(|t| {
            t.conditions_tagged(RenderAs::DisableSave)
                .next()
                .map(|c| c.expression.clone())
        }))
    }

    /// Operations whose transitions leave `current_state` and pass their
    /// conditions, in declaration order.
    pub fn allowed_operations(
        &self,
        entity: &Entity,
        current_state: &str,
    ) -> Result<IndexSet<String>, CoreError> {
        let definition = self.definitions.definition_for(entity)?;
        let Some(model) = capability(&definition) else {
            return Ok(IndexSet::new());
        };
        let transitions = self.providers.extract_transitions(entity, model);
        action::allowed_operations(&self.evaluator, entity, &transitions, current_state)
    }

    /// Actions the entity may invoke from `current_state`.
    pub fn allowed_actions(
        &self,
        entity: &Entity,
        current_state: Option<&str>,
    ) -> Result<IndexSet<Action>, CoreError> {
        self.compute_actions(entity, current_state, None)
    }

    /// Like [`allowed_actions`](Self::allowed_actions), limited to the
    /// action ids in `restrict_to`.
    pub fn allowed_actions_restricted(
        &self,
        entity: &Entity,
        current_state: Option<&str>,
        restrict_to: &IndexSet<String>,
    ) -> Result<IndexSet<Action>, CoreError> {
        self.compute_actions(entity, current_state, Some(restrict_to))
    }

    /// Actions allowed from the state stored in the entity's
    /// `state_property`.
    pub fn allowed_actions_for(
        &self,
        entity: &Entity,
        state_property: &str,
    ) -> Result<IndexSet<Action>, CoreError> {
        self.compute_actions(entity, entity.state(state_property), None)
    }

    fn compute_actions(
        &self,
        entity: &Entity,
        current_state: Option<&str>,
        restrict_to: Option<&IndexSet<String>>,
    ) -> Result<IndexSet<Action>, CoreError> {
        let definition = self.definitions.definition_for(entity)?;
        let Some(model) = capability(&definition) else {
            return Ok(IndexSet::new());
        };
        let transitions = self.providers.extract_transitions(entity, model);

        action::allowed_actions(
            &self.evaluator,
            self.action_filter.as_ref(),
            ActionQuery {
                entity,
                model,
                transitions: &transitions,
                current_state: non_blank(current_state),
                restrict_to,
            },
        )
    }

    /// Every state reachable through the static model, in declaration order.
    pub fn allowed_states(&self, entity: &Entity) -> Result<IndexSet<String>, CoreError> {
        let definition = self.definitions.definition_for(entity)?;
        Ok(capability(&definition)
            .map(action::allowed_states)
            .unwrap_or_default())
    }

    /// The transition groups declared by the entity's model.
    pub fn action_groups(&self, entity: Option<&Entity>) -> Result<Vec<TransitionGroup>, CoreError> {
        let entity = entity.ok_or(CoreError::MissingArgument { argument: "entity" })?;
        let definition = self.definitions.definition_for(entity)?;
        Ok(capability(&definition)
            .map(|model| model.groups.clone())
            .unwrap_or_default())
    }

    /// Actions declared for the entity with the given id.
    ///
    /// An empty `action_ids` returns every action; otherwise only the named
    /// ones. Unknown or unmanaged entities yield an empty set.
    pub fn actions(
        &self,
        id: &str,
        action_ids: &IndexSet<String>,
    ) -> Result<IndexSet<Action>, CoreError> {
        let Some(entity) = self.entities.resolve(id)? else {
            tracing::debug!("Entity {} not found", id);
            return Ok(IndexSet::new());
        };
        let definition = self.definitions.definition_for(&entity)?;
        let Some(model) = capability(&definition) else {
            return Ok(IndexSet::new());
        };

        Ok(model
            .definitions
            .iter()
            .filter(|d| self.action_filter.is_action(d))
            .filter(|d| action_ids.is_empty() || action_ids.contains(&d.identifier))
            .map(Action::from)
            .collect())
    }
}
