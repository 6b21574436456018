//! Error types for Condex Core

use thiserror::Error;

/// Core error type
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Type error: {0}")]
    TypeError(String),

    #[error("Invalid parameter '{parameter}' on condition type '{condition_type}': {message}")]
    InvalidParameter {
        condition_type: String,
        parameter: String,
        message: String,
    },

    #[error("Unknown condition type: {0}")]
    UnknownConditionType(String),

    #[error("Condition type '{0}' has neither a parent condition nor an evaluator/query builder")]
    NotExecutable(String),

    #[error("Parent condition chain exceeds maximum depth {max_depth} at type '{condition_type}'")]
    ParentDepthExceeded {
        condition_type: String,
        max_depth: usize,
    },

    #[error("Contextualization failed: {0}")]
    Contextualize(#[from] ContextualizeError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Failures while resolving `parameter::` / `script::` references
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ContextualizeError {
    /// A `parameter::<name>` reference with no value in the context
    #[error("Missing context parameter '{0}'")]
    MissingParameter(String),

    /// A reference (or script) that resolved to null inside a map
    #[error("Reference '{0}' resolved to null")]
    NullValue(String),

    /// A `script::` reference with no script evaluator configured
    #[error("No script evaluator configured for expression '{0}'")]
    NoScriptEvaluator(String),

    /// The script evaluator reported a failure
    #[error("Script '{expression}' failed: {message}")]
    Script { expression: String, message: String },
}

impl CoreError {
    pub fn invalid_parameter(
        condition_type: impl Into<String>,
        parameter: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        CoreError::InvalidParameter {
            condition_type: condition_type.into(),
            parameter: parameter.into(),
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for CoreError {
    fn from(err: serde_yaml::Error) -> Self {
        CoreError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
