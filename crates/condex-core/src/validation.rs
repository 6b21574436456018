//! Condition validation against condition-type parameter schemas

use crate::condition::Condition;
use crate::condition_type::{ConditionType, ConditionTypeResolver, Parameter, ParameterType};
use crate::contextualize::is_dynamic_reference;
use crate::types::Value;
use thiserror::Error;

/// Validation error. `path` locates the offending node, e.g.
/// `root.subConditions[1].subCondition`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("{path}: unknown condition type '{condition_type}'")]
    UnknownConditionType { path: String, condition_type: String },

    #[error("{path}: condition type '{condition_type}' is not executable")]
    NotExecutable { path: String, condition_type: String },

    #[error("{path}: required parameter '{parameter}' missing on '{condition_type}'")]
    RequiredParameterMissing {
        path: String,
        condition_type: String,
        parameter: String,
    },

    #[error("{path}: parameter '{parameter}' on '{condition_type}' {message}")]
    MultivalueMismatch {
        path: String,
        condition_type: String,
        parameter: String,
        message: String,
    },

    #[error("{path}: type mismatch for parameter '{parameter}' on '{condition_type}': expected {expected}, got {actual}")]
    TypeMismatch {
        path: String,
        condition_type: String,
        parameter: String,
        expected: String,
        actual: String,
    },

    #[error("{path}: unknown parameter '{parameter}' on '{condition_type}'")]
    UnknownParameter {
        path: String,
        condition_type: String,
        parameter: String,
    },
}

/// Validates condition trees against the schemas of a type resolver
pub struct ConditionValidator<'r> {
    resolver: &'r dyn ConditionTypeResolver,
    allow_unknown_parameters: bool,
}

impl<'r> ConditionValidator<'r> {
    pub fn new(resolver: &'r dyn ConditionTypeResolver) -> Self {
        Self {
            resolver,
            allow_unknown_parameters: true,
        }
    }

    /// Reject parameters the schema does not declare
    pub fn allow_unknown_parameters(mut self, allow: bool) -> Self {
        self.allow_unknown_parameters = allow;
        self
    }

    /// Validate the whole tree, reporting every error found
    pub fn validate(&self, condition: &Condition) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        self.validate_node(condition, "root", &mut errors);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn validate_node(&self, condition: &Condition, path: &str, errors: &mut Vec<ValidationError>) {
        let type_id = &condition.condition_type_id;
        match self.resolver.resolve(type_id) {
            None => errors.push(ValidationError::UnknownConditionType {
                path: path.to_string(),
                condition_type: type_id.clone(),
            }),
            Some(condition_type) => {
                if condition_type.check_executable().is_err() {
                    errors.push(ValidationError::NotExecutable {
                        path: path.to_string(),
                        condition_type: type_id.clone(),
                    });
                }
                self.validate_parameters(condition, &condition_type, path, errors);
            }
        }

        // Sub-conditions are checked even under an unknown parent type
        for (name, value) in &condition.parameter_values {
            match value {
                Value::Condition(sub) => {
                    self.validate_node(sub, &format!("{}.{}", path, name), errors);
                }
                Value::Array(items) => {
                    for (index, item) in items.iter().enumerate() {
                        if let Value::Condition(sub) = item {
                            self.validate_node(sub, &format!("{}.{}[{}]", path, name, index), errors);
                        }
                    }
                }
                _ => {}
            }
        }
    }

    fn validate_parameters(
        &self,
        condition: &Condition,
        condition_type: &ConditionType,
        path: &str,
        errors: &mut Vec<ValidationError>,
    ) {
        for parameter in &condition_type.parameters {
            match condition.parameter(&parameter.id) {
                None => {
                    if parameter.required && parameter.default_value.is_none() {
                        errors.push(ValidationError::RequiredParameterMissing {
                            path: path.to_string(),
                            condition_type: condition_type.id.clone(),
                            parameter: parameter.id.clone(),
                        });
                    }
                }
                Some(value) => {
                    if let Err(e) = check_value(parameter, value, &condition_type.id, path) {
                        errors.push(e);
                    }
                }
            }
        }

        if !self.allow_unknown_parameters {
            for name in condition.parameter_values.keys() {
                if condition_type.parameter(name).is_none() {
                    errors.push(ValidationError::UnknownParameter {
                        path: path.to_string(),
                        condition_type: condition_type.id.clone(),
                        parameter: name.clone(),
                    });
                }
            }
        }
    }
}

fn check_value(
    parameter: &Parameter,
    value: &Value,
    condition_type: &str,
    path: &str,
) -> Result<(), ValidationError> {
    if is_dynamic(value) {
        return Ok(());
    }
    let mismatch = |message: &str| ValidationError::MultivalueMismatch {
        path: path.to_string(),
        condition_type: condition_type.to_string(),
        parameter: parameter.id.clone(),
        message: message.to_string(),
    };

    match (parameter.multivalued, value) {
        (true, Value::Array(items)) => {
            for item in items.iter().filter(|v| !is_dynamic(v)) {
                check_single(parameter, item, condition_type, path)?;
            }
            Ok(())
        }
        (true, _) => Err(mismatch("must be a list")),
        (false, Value::Array(_)) if parameter.parameter_type != ParameterType::Any => {
            Err(mismatch("must be a single value"))
        }
        (false, single) => check_single(parameter, single, condition_type, path),
    }
}

fn check_single(
    parameter: &Parameter,
    value: &Value,
    condition_type: &str,
    path: &str,
) -> Result<(), ValidationError> {
    if parameter.parameter_type.accepts(value) {
        return Ok(());
    }
    Err(ValidationError::TypeMismatch {
        path: path.to_string(),
        condition_type: condition_type.to_string(),
        parameter: parameter.id.clone(),
        expected: format!("{:?}", parameter.parameter_type).to_lowercase(),
        actual: value.type_name().to_string(),
    })
}

fn is_dynamic(value: &Value) -> bool {
    matches!(value, Value::String(s) if is_dynamic_reference(s))
}
