//! Property comparisons

use crate::dispatcher::{ConditionEvaluator, ConditionEvaluatorDispatcher};
use crate::error::Result;
use condex_core::{Condition, ExecutionContext, Item, PropertyCondition};

/// Shared by the profile, session and event property condition types
pub struct PropertyConditionEvaluator;

impl ConditionEvaluator for PropertyConditionEvaluator {
    fn eval(
        &self,
        condition: &Condition,
        item: Option<&Item>,
        _context: &ExecutionContext,
        _dispatcher: &ConditionEvaluatorDispatcher,
    ) -> Result<bool> {
        let property = PropertyCondition::from_condition(condition)?;
        let actual = item
            .map(|item| item.values(property.property_name))
            .unwrap_or_default();
        Ok(property.matches(&actual))
    }
}
