//! Source-event property matching

use crate::dispatcher::{ConditionEvaluator, ConditionEvaluatorDispatcher};
use crate::error::Result;
use condex_core::item::SOURCE_EVENT_FIELDS;
use condex_core::{Condition, ConditionBuilder, ExecutionContext, Item};

/// `sourceEventPropertyCondition`: filters on the item an event came from.
///
/// Filters read `source.*` paths of the subject, the same fields the query
/// builder targets. Unlike an empty `booleanCondition`, a condition that
/// sets none of the filters matches every subject: no filter was asked for.
pub struct SourceEventPropertyConditionEvaluator;

impl ConditionEvaluator for SourceEventPropertyConditionEvaluator {
    fn eval(
        &self,
        condition: &Condition,
        item: Option<&Item>,
        context: &ExecutionContext,
        dispatcher: &ConditionEvaluatorDispatcher,
    ) -> Result<bool> {
        let filters: Vec<Condition> = SOURCE_EVENT_FIELDS
            .iter()
            .filter_map(|(parameter, field)| {
                let expected = condition.parameter(parameter)?;
                Some(ConditionBuilder::event_property(*field).equals(expected.clone()))
            })
            .collect();
        if filters.is_empty() {
            return Ok(true);
        }

        dispatcher.eval(&ConditionBuilder::and(filters), item, context)
    }
}

#[cfg(test)]
mod tests {
    use crate::evaluators::test_support::builtin_dispatcher;
    use condex_core::{ConditionBuilder, ExecutionContext, Item};

    fn page_view() -> Item {
        let page = Item::new("page", "home")
            .with_scope("acme")
            .with_field("properties.pageInfo.pagePath", "/home");
        Item::event("e1", "view", "p1").with_source(page)
    }

    #[test]
    fn test_filters_apply_to_the_source() {
        let dispatcher = builtin_dispatcher();
        let ctx = ExecutionContext::new();
        let event = page_view();

        let matching = ConditionBuilder::source_event_property(Some("home"), Some("/home"), Some("page"), Some("acme"));
        assert!(dispatcher.eval(&matching, Some(&event), &ctx).unwrap());

        let other_scope = ConditionBuilder::source_event_property(None, None, None, Some("globex"));
        assert!(!dispatcher.eval(&other_scope, Some(&event), &ctx).unwrap());
    }

    #[test]
    fn test_no_filters_always_match() {
        let dispatcher = builtin_dispatcher();
        let ctx = ExecutionContext::new();
        let unfiltered = ConditionBuilder::source_event_property(None, None, None, None);

        assert!(dispatcher.eval(&unfiltered, Some(&page_view()), &ctx).unwrap());
        assert!(dispatcher.eval(&unfiltered, Some(&Item::profile("p1")), &ctx).unwrap());
        assert!(dispatcher.eval(&unfiltered, None, &ctx).unwrap());
    }

    #[test]
    fn test_event_without_source_does_not_match_filters() {
        let dispatcher = builtin_dispatcher();
        let event = Item::event("e1", "view", "p1");
        let filtered = ConditionBuilder::source_event_property(Some("home"), None, None, None);
        assert!(!dispatcher.eval(&filtered, Some(&event), &ExecutionContext::new()).unwrap());
    }

    #[test]
    fn test_non_event_subjects_are_read_through_their_source() {
        let dispatcher = builtin_dispatcher();
        let ctx = ExecutionContext::new();
        let filtered = ConditionBuilder::source_event_property(Some("p1"), None, None, None);

        // a profile's own id is not its source id
        assert!(!dispatcher.eval(&filtered, Some(&Item::profile("p1")), &ctx).unwrap());

        let session = Item::session("s1", "p1").with_source(Item::new("page", "p1"));
        assert!(dispatcher.eval(&filtered, Some(&session), &ctx).unwrap());
    }
}
