//! Nested-path scoping

use crate::dispatcher::{ConditionEvaluator, ConditionEvaluatorDispatcher};
use crate::error::{Result, RuntimeError};
use condex_core::{Condition, ExecutionContext, Item, Value};

/// `nestedCondition`: `subCondition` must hold for at least one object of
/// the list at `path`, each object tested on its own.
pub struct NestedConditionEvaluator;

impl ConditionEvaluator for NestedConditionEvaluator {
    fn eval(
        &self,
        condition: &Condition,
        item: Option<&Item>,
        context: &ExecutionContext,
        dispatcher: &ConditionEvaluatorDispatcher,
    ) -> Result<bool> {
        let missing = |parameter: &str| {
            RuntimeError::invalid_parameter(
                &condition.condition_type_id,
                parameter,
                "both 'path' and 'subCondition' are required",
            )
        };
        let path = condition.string_parameter("path").ok_or_else(|| missing("path"))?;
        let sub = condition
            .condition_parameter("subCondition")
            .ok_or_else(|| missing("subCondition"))?;

        let Some(item) = item else {
            return Ok(false);
        };
        let elements = match item.lookup(path) {
            Some(Value::Array(elements)) => elements,
            Some(object @ Value::Object(_)) => vec![object],
            _ => return Ok(false),
        };

        for element in elements.into_iter().filter(|e| matches!(e, Value::Object(_))) {
            let scoped = item.scoped_to(path, element);
            if dispatcher.eval(sub, Some(&scoped), context)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
