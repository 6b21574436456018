//! Trivial evaluators

use crate::dispatcher::{ConditionEvaluator, ConditionEvaluatorDispatcher};
use crate::error::Result;
use condex_core::{Condition, ExecutionContext, Item};

/// `matchAllCondition`: matches every subject, absent ones included
pub struct MatchAllConditionEvaluator;

impl ConditionEvaluator for MatchAllConditionEvaluator {
    fn eval(
        &self,
        _condition: &Condition,
        _item: Option<&Item>,
        _context: &ExecutionContext,
        _dispatcher: &ConditionEvaluatorDispatcher,
    ) -> Result<bool> {
        Ok(true)
    }
}

/// `eventTypeCondition`: the event's `eventType` equals `eventTypeId`
pub struct EventTypeConditionEvaluator;

impl ConditionEvaluator for EventTypeConditionEvaluator {
    fn eval(
        &self,
        condition: &Condition,
        item: Option<&Item>,
        _context: &ExecutionContext,
        _dispatcher: &ConditionEvaluatorDispatcher,
    ) -> Result<bool> {
        let (Some(item), Some(expected)) = (item, condition.string_parameter("eventTypeId")) else {
            return Ok(false);
        };
        Ok(item.lookup("eventType").as_ref().and_then(|v| v.as_str()) == Some(expected))
    }
}
