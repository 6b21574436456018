//! Compiler error types

use condex_core::{ContextualizeError, CoreError};
use thiserror::Error;

/// Compilation error
#[derive(Error, Debug)]
pub enum CompileError {
    /// A query cannot quietly become "no filter", so unlike evaluation an
    /// unresolved type fails compilation
    #[error("Unresolved condition type: {0}")]
    UnresolvedType(String),

    /// Nothing is registered under the builder key, legacy mapping included
    #[error("No query builder registered under '{builder_key}' for condition type '{condition_type}'")]
    MissingQueryBuilder {
        condition_type: String,
        builder_key: String,
    },

    #[error("Condition type '{0}' has no query builder key")]
    NoQueryBuilderKey(String),

    #[error("Invalid parameter '{parameter}' on condition type '{condition_type}': {message}")]
    InvalidParameter {
        condition_type: String,
        parameter: String,
        message: String,
    },

    /// Identifier set larger than `max_ids_query_count`
    #[error("Parameter 'ids' holds {count} identifiers, more than the maximum of {max}")]
    TooManyIds { count: usize, max: usize },

    /// The sub-condition of a nested condition compiled to nothing
    #[error("Nested condition on '{path}' has a sub-condition that produced no query")]
    EmptyNestedQuery { path: String },

    #[error(transparent)]
    Contextualize(#[from] ContextualizeError),

    #[error("No past-event id provider configured to compile '{0}'")]
    NoPastEventIdsProvider(String),

    #[error("Past-event id lookup failed: {0}")]
    PastEventIds(String),

    #[error(transparent)]
    Core(CoreError),
}

impl CompileError {
    pub fn invalid_parameter(
        condition_type: impl Into<String>,
        parameter: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        CompileError::InvalidParameter {
            condition_type: condition_type.into(),
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    /// Short label used for error metrics
    pub fn kind(&self) -> &'static str {
        match self {
            CompileError::UnresolvedType(_) => "unresolved_type",
            CompileError::MissingQueryBuilder { .. } => "missing_query_builder",
            CompileError::NoQueryBuilderKey(_) => "no_query_builder_key",
            CompileError::InvalidParameter { .. } => "invalid_parameter",
            CompileError::TooManyIds { .. } => "too_many_ids",
            CompileError::EmptyNestedQuery { .. } => "empty_nested_query",
            CompileError::Contextualize(_) => "contextualize",
            CompileError::NoPastEventIdsProvider(_) => "no_past_event_ids_provider",
            CompileError::PastEventIds(_) => "past_event_ids",
            CompileError::Core(_) => "core",
        }
    }
}

impl From<CoreError> for CompileError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidParameter {
                condition_type,
                parameter,
                message,
            } => CompileError::InvalidParameter {
                condition_type,
                parameter,
                message,
            },
            CoreError::Contextualize(e) => CompileError::Contextualize(e),
            other => CompileError::Core(other),
        }
    }
}

/// Result type for compilation
pub type Result<T> = std::result::Result<T, CompileError>;
