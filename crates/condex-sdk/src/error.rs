//! SDK error types

use condex_core::ValidationError;
use thiserror::Error;

/// SDK error type
#[derive(Error, Debug)]
pub enum SdkError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Failure while loading configuration or condition types
    #[error("Load error: {0:#}")]
    LoadError(#[from] anyhow::Error),

    /// Condition tree rejected by the registry's parameter schemas
    #[error("Invalid condition: {}", format_validation(.0))]
    ValidationError(Vec<ValidationError>),

    /// Evaluation error
    #[error("Runtime error: {0}")]
    RuntimeError(#[from] condex_runtime::RuntimeError),

    /// Query compilation error
    #[error("Compiler error: {0}")]
    CompileError(#[from] condex_compiler::CompileError),
}

fn format_validation(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type for SDK operations
pub type Result<T> = std::result::Result<T, SdkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error() {
        let error = SdkError::ConfigError("no registry".to_string());
        assert!(error.to_string().contains("Configuration error"));
        assert!(error.to_string().contains("no registry"));
    }

    #[test]
    fn test_load_error_keeps_context_chain() {
        let inner = anyhow::anyhow!("file not found").context("Failed to read config file: a.yaml");
        let error: SdkError = inner.into();
        let message = error.to_string();
        assert!(message.contains("a.yaml"));
        assert!(message.contains("file not found"));
    }

    #[test]
    fn test_compile_error_conversion() {
        let error: SdkError = condex_compiler::CompileError::UnresolvedType("gone".to_string()).into();
        assert!(matches!(error, SdkError::CompileError(_)));
        assert!(error.to_string().contains("gone"));
    }
}
