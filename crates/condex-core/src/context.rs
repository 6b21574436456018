//! Execution context
//!
//! Ephemeral name -> value map supplied by the caller and threaded through
//! evaluation, compilation and contextualization. Macro-type expansion never
//! mutates a context in place: it derives a merged copy for the parent.

use crate::types::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionContext {
    values: BTreeMap<String, Value>,
    expansion_depth: usize,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to add a value
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    pub fn as_map(&self) -> &BTreeMap<String, Value> {
        &self.values
    }

    /// Copy of this context overlaid with `parameters` (parameters win)
    pub fn merged(&self, parameters: &BTreeMap<String, Value>) -> Self {
        let mut values = self.values.clone();
        values.extend(parameters.iter().map(|(k, v)| (k.clone(), v.clone())));
        Self {
            values,
            expansion_depth: self.expansion_depth,
        }
    }

    /// Number of macro expansions between the caller and this context
    pub fn expansion_depth(&self) -> usize {
        self.expansion_depth
    }

    /// Context for a macro type's parent: merged with the macro's
    /// parameters, one expansion deeper
    pub fn expand(&self, parameters: &BTreeMap<String, Value>) -> Self {
        let mut expanded = self.merged(parameters);
        expanded.expansion_depth += 1;
        expanded
    }
}

impl From<BTreeMap<String, Value>> for ExecutionContext {
    fn from(values: BTreeMap<String, Value>) -> Self {
        Self {
            values,
            expansion_depth: 0,
        }
    }
}

impl FromIterator<(String, Value)> for ExecutionContext {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self {
            values: iter.into_iter().collect(),
            expansion_depth: 0,
        }
    }
}
