//! Geo bounding

use crate::dispatcher::{ConditionEvaluator, ConditionEvaluatorDispatcher};
use crate::error::Result;
use condex_core::geo::{GeoPoint, GeoShape, LOCATION_PROPERTY};
use condex_core::{Condition, ExecutionContext, Item};

/// `geoLocationByPointSessionCondition`: the session location lies in a
/// circle or rectangle. Incomplete shape parameters select nothing to filter
/// on, so every subject matches.
pub struct GeoLocationByPointSessionConditionEvaluator;

impl ConditionEvaluator for GeoLocationByPointSessionConditionEvaluator {
    fn eval(
        &self,
        condition: &Condition,
        item: Option<&Item>,
        _context: &ExecutionContext,
        _dispatcher: &ConditionEvaluatorDispatcher,
    ) -> Result<bool> {
        let Some(shape) = GeoShape::from_condition(condition)? else {
            return Ok(true);
        };
        let point = item
            .and_then(|item| item.lookup(LOCATION_PROPERTY))
            .and_then(|location| GeoPoint::from_value(&location));
        Ok(point.is_some_and(|point| shape.contains(&point)))
    }
}
