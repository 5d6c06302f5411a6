//! Dynamic transition providers.
//!
//! Providers contribute extra transitions for an entity at evaluation time.
//! Their output is merged with the static model on every call and never
//! cached or written back into the model.

use crate::definition::{StateTransitionModel, Transition, TransitionKey};
use crate::entity::Entity;
use indexmap::IndexSet;
use std::borrow::Cow;
use std::sync::Arc;

/// A plugin contributing transitions for an entity.
pub trait DynamicTransitionProvider: Send + Sync {
    /// Returns the extra transitions for this entity, possibly none.
    fn provide(&self, entity: &Entity) -> Vec<Transition>;
}

impl<F> DynamicTransitionProvider for F
where
    F: Fn(&Entity) -> Vec<Transition> + Send + Sync,
{
    fn provide(&self, entity: &Entity) -> Vec<Transition> {
        self(entity)
    }
}

/// Ordered, immutable list of providers.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn DynamicTransitionProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a provider; providers are consulted in registration order.
    pub fn with_provider(mut self, provider: Arc<dyn DynamicTransitionProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Returns the static transitions merged with every provider's
    /// contribution.
    ///
    /// Without providers the static slice is borrowed as is. Otherwise a new
    /// list is built, keeping the first occurrence of each
    /// `(from, operation, to)` triple.
    pub fn extract_transitions<'a>(
        &self,
        entity: &Entity,
        model: &'a StateTransitionModel,
    ) -> Cow<'a, [Transition]> {
        if self.providers.is_empty() {
            return Cow::Borrowed(&model.transitions);
        }

        let contributed: Vec<Vec<Transition>> =
            self.providers.iter().map(|p| p.provide(entity)).collect();

        let mut seen: IndexSet<TransitionKey<'_>> = IndexSet::new();
        let mut merged = Vec::with_capacity(
            model.transitions.len() + contributed.iter().map(Vec::len).sum::<usize>(),
        );
        for t in model.transitions.iter().chain(contributed.iter().flatten()) {
            if seen.insert(t.key()) {
                merged.push(t.clone());
            }
        }

        let dynamic = merged.len().saturating_sub(model.transitions.len());
        if dynamic > 0 {
            tracing::trace!(
                "Merged {} dynamic transition(s) for entity {}",
                dynamic,
                entity.id
            );
        }

        Cow::Owned(merged)
    }
}
