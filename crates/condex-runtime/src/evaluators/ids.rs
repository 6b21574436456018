//! Identifier sets

use crate::dispatcher::{ConditionEvaluator, ConditionEvaluatorDispatcher};
use crate::error::Result;
use condex_core::{Condition, ExecutionContext, Item};

/// `idsCondition`: whether the item id is among `ids` equals `match`
/// (default `true`)
pub struct IdsConditionEvaluator;

impl ConditionEvaluator for IdsConditionEvaluator {
    fn eval(
        &self,
        condition: &Condition,
        item: Option<&Item>,
        _context: &ExecutionContext,
        _dispatcher: &ConditionEvaluatorDispatcher,
    ) -> Result<bool> {
        let Some(item) = item else {
            return Ok(false);
        };
        let ids = condition.string_list_parameter("ids").unwrap_or_default();
        let matching = condition.bool_parameter("match").unwrap_or(true);
        Ok(ids.iter().any(|id| *id == item.item_id) == matching)
    }
}
