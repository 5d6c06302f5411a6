//! # stmgr-core
//!
//! State transition engine for stmgr.
//!
//! This crate provides:
//! - Definition model types (transitions, conditions, actions, groups)
//! - Condition evaluation against entity properties
//! - Dynamic transition providers merged at evaluation time
//! - Transition resolution with wildcard fallback
//! - Allowed operation, action and state computation

pub mod action;
pub mod catalog;
pub mod collaborator;
pub mod condition;
pub mod definition;
pub mod engine;
pub mod entity;
pub mod error;
pub mod provider;
pub mod resolver;

pub use action::Action;
pub use catalog::{Catalog, CatalogDocument, ProviderSpec};
pub use collaborator::{
    ActionFilter, DefinitionService, EntityResolver, IdentityComparator, InitialStateProvider,
    TypeConverter, ValueKind,
};
pub use condition::ConditionEvaluator;
pub use definition::{
    Condition, DefinitionModel, RenderAs, StateTransitionModel, Transition, TransitionDefinition,
    TransitionGroup, WILDCARD_STATE,
};
pub use engine::TransitionManager;
pub use entity::Entity;
pub use error::{BoxError, ConversionError, CoreError};
pub use provider::{DynamicTransitionProvider, ProviderRegistry};
pub use resolver::Wildcard;
