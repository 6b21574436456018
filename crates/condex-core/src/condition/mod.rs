//! Condition Model
//!
//! A [`Condition`] is one node of the declarative boolean-expression tree: a
//! condition-type id plus a map of named parameter values. Parameter values
//! are scalars, nested conditions, or lists of conditions, so the node shape
//! is generic and new kinds are added by registering condition types, not by
//! extending an enum.
//!
//! # JSON shape
//!
//! ```json
//! {
//!   "type": "booleanCondition",
//!   "parameterValues": {
//!     "operator": "and",
//!     "subConditions": [
//!       {"type": "profilePropertyCondition",
//!        "parameterValues": {"propertyName": "properties.age",
//!                            "comparisonOperator": "greaterThan",
//!                            "propertyValueInteger": 18}}
//!     ]
//!   }
//! }
//! ```

mod builder;

pub use builder::{ConditionBuilder, PropertyConditionBuilder};

use crate::types::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Maximum tree depth walked by [`Condition::extract_by_type`]
const MAX_EXTRACT_DEPTH: usize = 1000;

/// One node of a condition tree
///
/// Conditions are immutable value objects once built: callers construct new
/// trees instead of mutating shared ones. Equality and hashing are structural
/// over the type id and the full parameter map.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Condition {
    /// Condition type id, resolved lazily through a type registry
    #[serde(rename = "type")]
    pub condition_type_id: String,

    /// Parameter name -> value
    #[serde(rename = "parameterValues")]
    pub parameter_values: BTreeMap<String, Value>,
}

impl Condition {
    /// Create a condition with no parameters
    pub fn new(condition_type_id: impl Into<String>) -> Self {
        Self {
            condition_type_id: condition_type_id.into(),
            parameter_values: BTreeMap::new(),
        }
    }

    /// Builder method to set a parameter
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameter_values.insert(name.into(), value.into());
        self
    }

    /// Set a parameter in place (used while a tree is still being built)
    pub fn set_parameter(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.parameter_values.insert(name.into(), value.into());
    }

    /// Raw parameter lookup; explicit nulls read as absent
    pub fn parameter(&self, name: &str) -> Option<&Value> {
        self.parameter_values.get(name).filter(|v| !v.is_null())
    }

    pub fn has_parameter(&self, name: &str) -> bool {
        self.parameter(name).is_some()
    }

    pub fn string_parameter(&self, name: &str) -> Option<&str> {
        self.parameter(name).and_then(Value::as_str)
    }

    pub fn bool_parameter(&self, name: &str) -> Option<bool> {
        self.parameter(name).and_then(Value::as_bool)
    }

    pub fn i64_parameter(&self, name: &str) -> Option<i64> {
        self.parameter(name).and_then(Value::as_i64)
    }

    pub fn f64_parameter(&self, name: &str) -> Option<f64> {
        self.parameter(name).and_then(Value::as_f64)
    }

    pub fn condition_parameter(&self, name: &str) -> Option<&Condition> {
        self.parameter(name).and_then(Value::as_condition)
    }

    /// A list-of-conditions parameter. Non-condition elements are skipped.
    pub fn conditions_parameter(&self, name: &str) -> Option<Vec<&Condition>> {
        self.parameter(name)
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_condition).collect())
    }

    /// A list parameter of scalars rendered as strings (e.g. `ids`)
    pub fn string_list_parameter(&self, name: &str) -> Option<Vec<String>> {
        match self.parameter(name)? {
            Value::Array(items) => Some(
                items
                    .iter()
                    .filter(|v| !v.is_null())
                    .map(|v| v.to_string())
                    .collect(),
            ),
            scalar => Some(vec![scalar.to_string()]),
        }
    }

    /// Direct sub-conditions: condition-valued parameters and the
    /// condition elements of list-valued parameters, in parameter order
    pub fn sub_conditions(&self) -> Vec<&Condition> {
        let mut result = Vec::new();
        for value in self.parameter_values.values() {
            match value {
                Value::Condition(c) => result.push(c.as_ref()),
                Value::Array(items) => {
                    result.extend(items.iter().filter_map(Value::as_condition));
                }
                _ => {}
            }
        }
        result
    }

    /// All conditions of `type_id` in this tree (self included), depth-first
    pub fn extract_by_type(&self, type_id: &str) -> Vec<&Condition> {
        let mut result = Vec::new();
        self.extract_into(type_id, &mut result, 0);
        result
    }

    fn extract_into<'a>(&'a self, type_id: &str, result: &mut Vec<&'a Condition>, depth: usize) {
        if depth > MAX_EXTRACT_DEPTH {
            return;
        }
        if self.condition_type_id == type_id {
            result.push(self);
        }
        for sub in self.sub_conditions() {
            sub.extract_into(type_id, result, depth + 1);
        }
    }

    /// Render as a `serde_json::Value` in the `{type, parameterValues}` shape
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "type": self.condition_type_id,
            "parameterValues": serde_json::Value::Object(
                self.parameter_values
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect()
            ),
        })
    }

    /// Parse from JSON text
    pub fn from_json(json: &str) -> crate::error::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
