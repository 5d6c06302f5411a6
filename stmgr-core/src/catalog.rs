//! In-memory catalog of definitions, entities and initial states.
//!
//! A catalog implements every lookup the [`TransitionManager`] needs, which
//! makes it the simplest way to query the engine offline. Catalog documents
//! are YAML or JSON:
//!
//! ```yaml
//! definitions:
//!   - identifier: document
//!     state_transitions:
//!       transitions:
//!         - { from: draft, operation: submit, to: review }
//! entities:
//!   - id: doc-1
//!     definition: document
//!     category: case
//!     properties: { status: draft, owner: alice }
//! initial_states:
//!   case: draft
//! providers:
//!   - name: archiving
//!     definition: document
//!     when:
//!       - { identifier: archivable, expression: "true", render_as: PROPERTY }
//!     transitions:
//!       - { from: draft, operation: archive, to: archived }
//! ```

use crate::collaborator::{DefinitionService, EntityResolver, InitialStateProvider};
use crate::condition::ConditionEvaluator;
use crate::definition::{Condition, DefinitionModel, Transition};
use crate::engine::TransitionManager;
use crate::entity::Entity;
use crate::error::{BoxError, CoreError};
use crate::provider::{DynamicTransitionProvider, ProviderRegistry};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Serialized form of a catalog.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogDocument {
    pub definitions: Vec<DefinitionModel>,
    pub entities: Vec<Entity>,
    /// Initial state per entity category.
    pub initial_states: IndexMap<String, String>,
    pub providers: Vec<ProviderSpec>,
}

/// A declarative dynamic provider.
///
/// Contributes its transitions to entities of `definition` (any entity when
/// unset) whose properties satisfy `when`, using the transition guard rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSpec {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub when: Vec<Condition>,

    pub transitions: Vec<Transition>,
}

impl ProviderSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            definition: None,
            when: Vec::new(),
            transitions: Vec::new(),
        }
    }

    pub fn for_definition(mut self, definition: impl Into<String>) -> Self {
        self.definition = Some(definition.into());
        self
    }

    pub fn when(mut self, condition: Condition) -> Self {
        self.when.push(condition);
        self
    }

    pub fn with_transition(mut self, transition: Transition) -> Self {
        self.transitions.push(transition);
        self
    }
}

struct SpecProvider {
    spec: ProviderSpec,
    evaluator: ConditionEvaluator,
}

impl DynamicTransitionProvider for SpecProvider {
    fn provide(&self, entity: &Entity) -> Vec<Transition> {
        if let Some(definition) = &self.spec.definition {
            if *definition != entity.definition {
                return Vec::new();
            }
        }

        match self.evaluator.check_all(entity, &self.spec.when) {
            Ok(true) => self.spec.transitions.clone(),
            Ok(false) => Vec::new(),
            Err(e) => {
                tracing::warn!(
                    "Provider '{}' skipped for entity {}: {}",
                    self.spec.name,
                    entity.id,
                    e
                );
                Vec::new()
            }
        }
    }
}

/// Indexed, immutable catalog.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    definitions: IndexMap<String, Arc<DefinitionModel>>,
    entities: IndexMap<String, Entity>,
    initial_states: IndexMap<String, String>,
    providers: Vec<ProviderSpec>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a catalog from a document, validating and optimizing every
    /// definition.
    pub fn from_document(document: CatalogDocument) -> Result<Self, CoreError> {
        let mut definitions = IndexMap::new();
        for mut definition in document.definitions {
            definition.validate()?;
            definition.optimize();
            let id = definition.identifier.clone();
            if definitions.insert(id.clone(), Arc::new(definition)).is_some() {
                return Err(CoreError::InvalidDefinition {
                    definition: id,
                    reason: "defined more than once".to_string(),
                });
            }
        }

        let mut entities = IndexMap::new();
        for entity in document.entities {
            if entities.contains_key(&entity.id) {
                tracing::warn!("Duplicate entity {} in catalog, keeping the last", entity.id);
            }
            entities.insert(entity.id.clone(), entity);
        }

        Ok(Self {
            definitions,
            entities,
            initial_states: document.initial_states,
            providers: document.providers,
        })
    }

    /// Parses a JSON catalog document.
    pub fn from_json_str(json: &str) -> Result<Self, CoreError> {
        Self::from_document(serde_json::from_str(json)?)
    }

    /// Parses a YAML catalog document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, CoreError> {
        Self::from_document(serde_yaml::from_str(yaml)?)
    }

    /// Adds a definition, optimizing its transitions as loading does.
    pub fn with_definition(mut self, mut definition: DefinitionModel) -> Self {
        definition.optimize();
        self.definitions
            .insert(definition.identifier.clone(), Arc::new(definition));
        self
    }

    pub fn with_entity(mut self, entity: Entity) -> Self {
        self.entities.insert(entity.id.clone(), entity);
        self
    }

    pub fn with_initial_state(
        mut self,
        category: impl Into<String>,
        state: impl Into<String>,
    ) -> Self {
        self.initial_states.insert(category.into(), state.into());
        self
    }

    pub fn with_provider(mut self, spec: ProviderSpec) -> Self {
        self.providers.push(spec);
        self
    }

    pub fn definition(&self, identifier: &str) -> Option<&Arc<DefinitionModel>> {
        self.definitions.get(identifier)
    }

    pub fn definitions(&self) -> impl Iterator<Item = &DefinitionModel> {
        self.definitions.values().map(Arc::as_ref)
    }

    pub fn entity(&self, id: &str) -> Option<&Entity> {
        self.entities.get(id)
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn provider_specs(&self) -> &[ProviderSpec] {
        &self.providers
    }

    /// Returns the declared providers as a registry, in declaration order.
    pub fn provider_registry(&self) -> ProviderRegistry {
        self.providers
            .iter()
            .fold(ProviderRegistry::new(), |registry, spec| {
                registry.with_provider(Arc::new(SpecProvider {
                    spec: spec.clone(),
                    evaluator: ConditionEvaluator::default(),
                }))
            })
    }

    /// Creates a manager backed by this catalog, with its declared providers.
    pub fn manager(self: &Arc<Self>) -> TransitionManager {
        TransitionManager::new(self.clone(), self.clone(), self.clone())
            .with_providers(self.provider_registry())
    }
}

impl DefinitionService for Catalog {
    fn definition_for(&self, entity: &Entity) -> Result<Option<Arc<DefinitionModel>>, BoxError> {
        Ok(self.definitions.get(&entity.definition).cloned())
    }
}

impl InitialStateProvider for Catalog {
    fn initial_state(&self, category: &str) -> Result<Option<String>, BoxError> {
        Ok(self.initial_states.get(category).cloned())
    }
}

impl EntityResolver for Catalog {
    fn resolve(&self, id: &str) -> Result<Option<Entity>, BoxError> {
        Ok(self.entities.get(id).cloned())
    }
}
