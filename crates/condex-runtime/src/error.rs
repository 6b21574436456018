//! Runtime error types

use condex_core::{ContextualizeError, CoreError};
use thiserror::Error;

/// Evaluation error
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// The type resolved but nothing is registered under its evaluator key
    #[error("No evaluator registered under '{evaluator_key}' for condition type '{condition_type}'")]
    MissingEvaluator {
        condition_type: String,
        evaluator_key: String,
    },

    /// The type resolved but declares no evaluator key
    #[error("Condition type '{0}' has no evaluator key")]
    NoEvaluatorKey(String),

    /// Structural problem with a condition's parameters
    #[error("Invalid parameter '{parameter}' on condition type '{condition_type}': {message}")]
    InvalidParameter {
        condition_type: String,
        parameter: String,
        message: String,
    },

    #[error(transparent)]
    Contextualize(#[from] ContextualizeError),

    /// Past-event evaluation needed a live count but no counter is attached
    #[error("No past-event counter configured to evaluate '{0}'")]
    NoPastEventCounter(String),

    #[error("Past-event count failed: {0}")]
    PastEventCount(String),

    #[error(transparent)]
    Core(CoreError),
}

impl RuntimeError {
    pub fn invalid_parameter(
        condition_type: impl Into<String>,
        parameter: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        RuntimeError::InvalidParameter {
            condition_type: condition_type.into(),
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    /// Short label used for error metrics
    pub fn kind(&self) -> &'static str {
        match self {
            RuntimeError::MissingEvaluator { .. } => "missing_evaluator",
            RuntimeError::NoEvaluatorKey(_) => "no_evaluator_key",
            RuntimeError::InvalidParameter { .. } => "invalid_parameter",
            RuntimeError::Contextualize(_) => "contextualize",
            RuntimeError::NoPastEventCounter(_) => "no_past_event_counter",
            RuntimeError::PastEventCount(_) => "past_event_count",
            RuntimeError::Core(_) => "core",
        }
    }
}

impl From<CoreError> for RuntimeError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidParameter {
                condition_type,
                parameter,
                message,
            } => RuntimeError::InvalidParameter {
                condition_type,
                parameter,
                message,
            },
            CoreError::Contextualize(e) => RuntimeError::Contextualize(e),
            other => RuntimeError::Core(other),
        }
    }
}

/// Result type for evaluation
pub type Result<T> = std::result::Result<T, RuntimeError>;
