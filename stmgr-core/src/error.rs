//! Core error types.

use thiserror::Error;

/// Boxed error returned by injected collaborators.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors from the state transition engine.
///
/// Unmanaged entities, unmatched transitions and empty required-field sets
/// are not errors; only violated preconditions and collaborator failures
/// surface here.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("missing mandatory argument: {argument}")]
    MissingArgument { argument: &'static str },

    #[error("invalid definition model '{definition}': {reason}")]
    InvalidDefinition { definition: String, reason: String },

    #[error(transparent)]
    Collaborator(#[from] BoxError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl CoreError {
    /// Returns an error code suitable for command-line or API responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            CoreError::MissingArgument { .. } => "BAD_REQUEST",
            CoreError::InvalidDefinition { .. } => "INVALID_DEFINITION",
            CoreError::Collaborator(_) => "COLLABORATOR_FAILURE",
            CoreError::Json(_) => "BAD_REQUEST",
            CoreError::Yaml(_) => "BAD_REQUEST",
        }
    }
}

/// A condition expression could not be converted to the property's type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot convert '{raw}' to {target}")]
pub struct ConversionError {
    pub target: &'static str,
    pub raw: String,
}
