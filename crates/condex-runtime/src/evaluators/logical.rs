//! Boolean composition and negation

use crate::dispatcher::{ConditionEvaluator, ConditionEvaluatorDispatcher};
use crate::error::{Result, RuntimeError};
use condex_core::{Condition, ExecutionContext, Item};

/// `booleanCondition`: `and` / `or` over `subConditions`, short-circuiting.
/// An empty or absent list never matches, whatever the operator.
pub struct BooleanConditionEvaluator;

impl ConditionEvaluator for BooleanConditionEvaluator {
    fn eval(
        &self,
        condition: &Condition,
        item: Option<&Item>,
        context: &ExecutionContext,
        dispatcher: &ConditionEvaluatorDispatcher,
    ) -> Result<bool> {
        let operator = condition.string_parameter("operator").unwrap_or("and");
        let is_and = if operator.eq_ignore_ascii_case("and") {
            true
        } else if operator.eq_ignore_ascii_case("or") {
            false
        } else {
            return Err(RuntimeError::invalid_parameter(
                &condition.condition_type_id,
                "operator",
                format!("unknown boolean operator '{}'", operator),
            ));
        };

        let sub_conditions = condition
            .conditions_parameter("subConditions")
            .unwrap_or_default();
        if sub_conditions.is_empty() {
            return Ok(false);
        }

        for sub in sub_conditions {
            let matched = dispatcher.eval(sub, item, context)?;
            if matched != is_and {
                return Ok(matched);
            }
        }
        Ok(is_and)
    }
}

/// `notCondition`: inverts its single `subCondition`
pub struct NotConditionEvaluator;

impl ConditionEvaluator for NotConditionEvaluator {
    fn eval(
        &self,
        condition: &Condition,
        item: Option<&Item>,
        context: &ExecutionContext,
        dispatcher: &ConditionEvaluatorDispatcher,
    ) -> Result<bool> {
        let sub = condition.condition_parameter("subCondition").ok_or_else(|| {
            RuntimeError::invalid_parameter(
                &condition.condition_type_id,
                "subCondition",
                "a sub-condition is required",
            )
        })?;
        Ok(!dispatcher.eval(sub, item, context)?)
    }
}
