//! Past-event aggregation

use crate::dispatcher::{ConditionEvaluator, ConditionEvaluatorDispatcher};
use crate::error::{Result, RuntimeError};
use condex_core::item::PROFILE_ITEM_TYPE;
use condex_core::{Condition, ExecutionContext, Item, PastEventFallback, PastEventParams};
use tracing::debug;

/// `pastEventCondition`: counts the subject's events matching
/// `eventCondition`.
///
/// The pre-computed counter on the profile is read when the condition
/// carries a current `generatedPropertyKey`. Otherwise the count comes from
/// the dispatcher's [`PastEventCounter`](condex_core::PastEventCounter),
/// unless the engine is configured to trust counters only.
pub struct PastEventConditionEvaluator;

impl ConditionEvaluator for PastEventConditionEvaluator {
    fn eval(
        &self,
        condition: &Condition,
        item: Option<&Item>,
        context: &ExecutionContext,
        dispatcher: &ConditionEvaluatorDispatcher,
    ) -> Result<bool> {
        let params = PastEventParams::from_condition(condition)?;
        let Some(item) = item else {
            return Ok(false);
        };

        let stored = params
            .usable_counter_key()
            .and_then(|key| PastEventParams::counter_on(item, key));
        let count = match stored {
            Some(count) => count,
            None => match dispatcher.config().past_event_fallback {
                PastEventFallback::CounterOnly => 0,
                PastEventFallback::LiveQuery => {
                    let counter = dispatcher.past_event_counter().ok_or_else(|| {
                        RuntimeError::NoPastEventCounter(condition.condition_type_id.clone())
                    })?;
                    let profile_id = profile_id_of(item);
                    let events = params.event_condition(profile_id.as_deref());
                    debug!(profile_id = ?profile_id, "counting past events with a live query");
                    counter
                        .count_events(&events, context)
                        .map_err(|e| RuntimeError::PastEventCount(format!("{:#}", e)))?
                }
            },
        };
        Ok(params.matches_count(count))
    }
}

/// Profiles are their own subject; sessions and events point at one
fn profile_id_of(item: &Item) -> Option<String> {
    if item.item_type == PROFILE_ITEM_TYPE {
        return Some(item.item_id.clone());
    }
    item.lookup("profileId")
        .and_then(|v| v.as_str().map(str::to_string))
}

#[cfg(test)]
mod tests {
    use crate::dispatcher::ConditionEvaluatorDispatcher;
    use crate::error::RuntimeError;
    use crate::evaluators::test_support::builtin_dispatcher;
    use condex_core::past_event::PAST_EVENTS_PATH;
    use condex_core::{
        Condition, ConditionBuilder, ConditionTypeRegistry, EngineConfig, ExecutionContext, Item,
        PastEventCounter, PastEventFallback, PastEventParams, Value,
    };
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct FixedCounter {
        count: u64,
        calls: AtomicUsize,
    }

    impl PastEventCounter for FixedCounter {
        fn count_events(&self, event_condition: &Condition, _: &ExecutionContext) -> anyhow::Result<u64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert_eq!(event_condition.condition_type_id, "booleanCondition");
            Ok(self.count)
        }
    }

    fn purchases(operator: &str) -> Condition {
        ConditionBuilder::past_event(ConditionBuilder::event_type("purchase"))
            .with_parameter("operator", operator)
            .with_parameter("numberOfDays", 30)
            .with_parameter("minimumEventCount", 2)
    }

    fn with_key(condition: Condition) -> Condition {
        let key = PastEventParams::from_condition(&condition).unwrap().computed_key();
        condition.with_parameter("generatedPropertyKey", key)
    }

    fn profile_with_count(condition: &Condition, count: i64) -> Item {
        let key = PastEventParams::from_condition(condition).unwrap().computed_key();
        let mut entry = BTreeMap::new();
        entry.insert("key".to_string(), Value::from(key));
        entry.insert("count".to_string(), Value::from(count));
        Item::profile("p1").with_field(PAST_EVENTS_PATH, Value::Array(vec![Value::Object(entry)]))
    }

    fn dispatcher_with_counter(counter: Arc<FixedCounter>, config: EngineConfig) -> ConditionEvaluatorDispatcher {
        let registry = ConditionTypeRegistry::with_builtin_types().unwrap();
        ConditionEvaluatorDispatcher::new(Arc::new(registry))
            .with_builtin_evaluators()
            .with_config(config)
            .with_past_event_counter(counter)
    }

    #[test]
    fn test_counter_is_preferred() {
        let counter = Arc::new(FixedCounter { count: 0, calls: AtomicUsize::new(0) });
        let dispatcher = dispatcher_with_counter(counter.clone(), EngineConfig::default());
        let ctx = ExecutionContext::new();
        let condition = with_key(purchases("eventsOccurred"));

        assert!(dispatcher.eval(&condition, Some(&profile_with_count(&condition, 3)), &ctx).unwrap());
        assert!(!dispatcher.eval(&condition, Some(&profile_with_count(&condition, 1)), &ctx).unwrap());
        assert_eq!(counter.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_live_count_when_counter_absent() {
        let counter = Arc::new(FixedCounter { count: 4, calls: AtomicUsize::new(0) });
        let dispatcher = dispatcher_with_counter(counter.clone(), EngineConfig::default());
        let ctx = ExecutionContext::new();

        let condition = with_key(purchases("eventsOccurred"));
        assert!(dispatcher.eval(&condition, Some(&Item::profile("p1")), &ctx).unwrap());

        let not_occurred = with_key(purchases("eventsNotOccurred"));
        assert!(!dispatcher.eval(&not_occurred, Some(&Item::profile("p1")), &ctx).unwrap());
        assert_eq!(counter.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_stale_key_ignores_counter() {
        let counter = Arc::new(FixedCounter { count: 0, calls: AtomicUsize::new(0) });
        let dispatcher = dispatcher_with_counter(counter.clone(), EngineConfig::default());
        let condition = purchases("eventsOccurred");
        let profile = profile_with_count(&condition, 5);
        let stale = condition.with_parameter("generatedPropertyKey", "eventTriggeredold");

        assert!(!dispatcher.eval(&stale, Some(&profile), &ExecutionContext::new()).unwrap());
        assert_eq!(counter.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_counter_only_fallback() {
        let counter = Arc::new(FixedCounter { count: 9, calls: AtomicUsize::new(0) });
        let config = EngineConfig::default().with_past_event_fallback(PastEventFallback::CounterOnly);
        let dispatcher = dispatcher_with_counter(counter.clone(), config);
        let ctx = ExecutionContext::new();

        let not_occurred = with_key(purchases("eventsNotOccurred"));
        assert!(dispatcher.eval(&not_occurred, Some(&Item::profile("p1")), &ctx).unwrap());
        assert_eq!(counter.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_live_count_without_counter_is_an_error() {
        let dispatcher = builtin_dispatcher();
        let err = dispatcher
            .eval(&purchases("eventsOccurred"), Some(&Item::profile("p1")), &ExecutionContext::new())
            .unwrap_err();
        assert!(matches!(err, RuntimeError::NoPastEventCounter(_)));
    }

    #[test]
    fn test_unknown_operator() {
        let dispatcher = builtin_dispatcher();
        let err = dispatcher
            .eval(&purchases("eventsMaybe"), Some(&Item::profile("p1")), &ExecutionContext::new())
            .unwrap_err();
        assert!(matches!(err, RuntimeError::InvalidParameter { ref parameter, .. } if parameter == "operator"));
    }
}
