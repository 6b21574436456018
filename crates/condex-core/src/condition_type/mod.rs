//! Condition Types
//!
//! A [`ConditionType`] describes one kind of condition: its parameter schema,
//! which evaluator and query builder handle it, and an optional parent
//! condition for types that are a fixed parameterization of another type.

mod registry;

pub use registry::ConditionTypeRegistry;

use crate::condition::Condition;
use crate::context::ExecutionContext;
use crate::error::{CoreError, Result};
use crate::types::Value;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Resolves a condition type id to its definition
///
/// `None` is the recoverable "unresolved type" state; callers decide the
/// fallback.
pub trait ConditionTypeResolver: Send + Sync {
    fn resolve(&self, condition_type_id: &str) -> Option<Arc<ConditionType>>;
}

impl ConditionTypeResolver for HashMap<String, Arc<ConditionType>> {
    fn resolve(&self, condition_type_id: &str) -> Option<Arc<ConditionType>> {
        self.get(condition_type_id).cloned()
    }
}

/// Describes a kind of condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionType {
    /// Globally unique id
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub system_tags: Vec<String>,

    /// Direct-evaluation strategy key
    #[serde(
        default,
        rename = "conditionEvaluator",
        alias = "evaluatorKey",
        skip_serializing_if = "Option::is_none"
    )]
    pub evaluator_key: Option<String>,

    /// Query-compilation strategy key
    #[serde(
        default,
        rename = "queryBuilder",
        alias = "queryBuilderKey",
        skip_serializing_if = "Option::is_none"
    )]
    pub query_builder_key: Option<String>,

    /// Ordered parameter schema
    #[serde(default)]
    pub parameters: Vec<Parameter>,

    /// When present, this type is a macro over the parent condition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_condition: Option<Condition>,
}

impl ConditionType {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            description: None,
            system_tags: Vec::new(),
            evaluator_key: None,
            query_builder_key: None,
            parameters: Vec::new(),
            parent_condition: None,
        }
    }

    pub fn with_evaluator(mut self, key: impl Into<String>) -> Self {
        self.evaluator_key = Some(key.into());
        self
    }

    pub fn with_query_builder(mut self, key: impl Into<String>) -> Self {
        self.query_builder_key = Some(key.into());
        self
    }

    pub fn with_parent(mut self, parent: Condition) -> Self {
        self.parent_condition = Some(parent);
        self
    }

    pub fn with_parameter(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn with_system_tag(mut self, tag: impl Into<String>) -> Self {
        self.system_tags.push(tag.into());
        self
    }

    /// True when this type is a parameterization of a parent condition
    pub fn is_macro(&self) -> bool {
        self.parent_condition.is_some()
    }

    /// Schema entry for a parameter
    pub fn parameter(&self, id: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.id == id)
    }

    /// Context the parent condition of a macro type runs in: parameter
    /// defaults overlaid with the condition's own values, merged into
    /// `context` one expansion deeper.
    ///
    /// Fails once `max_depth` expansions are stacked, which also stops
    /// parent chains that loop back on themselves.
    pub fn expansion_context(
        &self,
        condition: &Condition,
        context: &ExecutionContext,
        max_depth: usize,
    ) -> Result<ExecutionContext> {
        if context.expansion_depth() >= max_depth {
            return Err(CoreError::ParentDepthExceeded {
                condition_type: self.id.clone(),
                max_depth,
            });
        }
        let mut parameters: BTreeMap<String, Value> = self
            .parameters
            .iter()
            .filter_map(|p| Some((p.id.clone(), p.default_value.clone()?)))
            .collect();
        parameters.extend(
            condition
                .parameter_values
                .iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        Ok(context.expand(&parameters))
    }

    /// Fail fast on a type that can be neither expanded nor dispatched
    pub fn check_executable(&self) -> Result<()> {
        if self.parent_condition.is_none()
            && self.evaluator_key.is_none()
            && self.query_builder_key.is_none()
        {
            return Err(CoreError::NotExecutable(self.id.clone()));
        }
        Ok(())
    }
}

/// Declared type of a parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    #[serde(alias = "id", alias = "comparisonOperator")]
    String,
    #[serde(alias = "long")]
    Integer,
    #[serde(alias = "float")]
    Double,
    Boolean,
    Date,
    #[serde(alias = "Condition")]
    Condition,
    Object,
    /// Unchecked
    #[serde(other)]
    Any,
}

impl ParameterType {
    /// Whether a single (non-list) value conforms to this type
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            ParameterType::String => matches!(value, Value::String(_)),
            ParameterType::Integer => value.as_i64().is_some(),
            ParameterType::Double => value.as_f64().is_some(),
            ParameterType::Boolean => value.as_bool().is_some(),
            ParameterType::Date => match value {
                Value::Number(_) => true,
                Value::String(s) => crate::date::parse_date(s).is_some(),
                _ => false,
            },
            ParameterType::Condition => matches!(value, Value::Condition(_)),
            ParameterType::Object => !value.is_null(),
            ParameterType::Any => true,
        }
    }
}

/// One parameter descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Parameter {
    pub id: String,

    #[serde(rename = "type")]
    pub parameter_type: ParameterType,

    #[serde(default)]
    pub multivalued: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,

    #[serde(default)]
    pub required: bool,
}

impl Parameter {
    pub fn new(id: impl Into<String>, parameter_type: ParameterType) -> Self {
        Self {
            id: id.into(),
            parameter_type,
            multivalued: false,
            default_value: None,
            required: false,
        }
    }

    pub fn multivalued(mut self) -> Self {
        self.multivalued = true;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default_value = Some(value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expansion_context_merges_defaults_then_values() {
        let macro_type = ConditionType::new("adult")
            .with_parent(Condition::new("profilePropertyCondition"))
            .with_parameter(Parameter::new("minAge", ParameterType::Integer).with_default(18))
            .with_parameter(Parameter::new("country", ParameterType::String).with_default("FR"));
        let condition = Condition::new("adult").with_parameter("minAge", 21);
        let base = ExecutionContext::new().with("country", "DE").with("other", 1);

        let expanded = macro_type.expansion_context(&condition, &base, 10).unwrap();

        assert_eq!(expanded.get("minAge"), Some(&Value::from(21)));
        assert_eq!(expanded.get("country"), Some(&Value::from("FR")));
        assert_eq!(expanded.get("other"), Some(&Value::from(1)));
        assert_eq!(expanded.expansion_depth(), 1);
    }

    #[test]
    fn test_expansion_context_depth_limit() {
        let macro_type = ConditionType::new("loop").with_parent(Condition::new("loop"));
        let mut context = ExecutionContext::new();
        for _ in 0..3 {
            context = macro_type
                .expansion_context(&Condition::new("loop"), &context, 3)
                .unwrap();
        }
        let err = macro_type
            .expansion_context(&Condition::new("loop"), &context, 3)
            .unwrap_err();
        assert!(matches!(err, CoreError::ParentDepthExceeded { max_depth: 3, .. }));
    }

    #[test]
    fn test_check_executable() {
        assert!(ConditionType::new("a").with_evaluator("x").check_executable().is_ok());
        assert!(ConditionType::new("b").with_query_builder("x").check_executable().is_ok());
        assert!(ConditionType::new("c")
            .with_parent(Condition::new("matchAllCondition"))
            .check_executable()
            .is_ok());

        let err = ConditionType::new("d").check_executable().unwrap_err();
        assert!(matches!(err, CoreError::NotExecutable(id) if id == "d"));
    }

    #[test]
    fn test_condition_type_json_names() {
        let json = r#"{
            "id": "adultProfileCondition",
            "systemTags": ["profileCondition"],
            "conditionEvaluator": "propertyConditionEvaluator",
            "queryBuilder": "propertyConditionESQueryBuilder",
            "parameters": [
                {"id": "propertyName", "type": "string", "required": true},
                {"id": "ids", "type": "id", "multivalued": true},
                {"id": "subCondition", "type": "Condition"},
                {"id": "location", "type": "geopoint"}
            ]
        }"#;
        let ct: ConditionType = serde_json::from_str(json).unwrap();

        assert_eq!(ct.evaluator_key.as_deref(), Some("propertyConditionEvaluator"));
        assert_eq!(ct.query_builder_key.as_deref(), Some("propertyConditionESQueryBuilder"));
        assert_eq!(ct.system_tags, vec!["profileCondition".to_string()]);
        assert_eq!(ct.parameter("ids").unwrap().parameter_type, ParameterType::String);
        assert!(ct.parameter("ids").unwrap().multivalued);
        assert_eq!(
            ct.parameter("subCondition").unwrap().parameter_type,
            ParameterType::Condition
        );
        assert_eq!(ct.parameter("location").unwrap().parameter_type, ParameterType::Any);
    }

    #[test]
    fn test_parameter_type_accepts() {
        assert!(ParameterType::Integer.accepts(&Value::Number(3.0)));
        assert!(!ParameterType::Integer.accepts(&Value::Number(3.5)));
        assert!(ParameterType::Double.accepts(&Value::from("2.5")));
        assert!(ParameterType::Date.accepts(&Value::from("2024-03-01T10:00:00Z")));
        assert!(ParameterType::Date.accepts(&Value::from("2024-03-01")));
        assert!(!ParameterType::Date.accepts(&Value::from("yesterday")));
        assert!(!ParameterType::Condition.accepts(&Value::from("x")));
    }
}
