//! Past-event builder

use crate::compiler::{ConditionQueryBuilder, QueryCompiler};
use crate::error::{CompileError, Result};
use crate::query::QueryTarget;
use condex_core::{Condition, ConditionBuilder, ExecutionContext, PastEventParams};
use tracing::debug;

/// `pastEventCondition`.
///
/// With a usable counter key the condition becomes a query on the profile's
/// stored counters. Otherwise the matching profiles are looked up through the
/// compiler's [`PastEventIdsProvider`](crate::PastEventIdsProvider) and the
/// condition becomes an identifier filter, bounded like any other.
///
/// The builder only composes other conditions, so it serves every query
/// target.
pub struct PastEventConditionQueryBuilder;

impl<Q: QueryTarget> ConditionQueryBuilder<Q> for PastEventConditionQueryBuilder {
    fn build_query(
        &self,
        condition: &Condition,
        context: &ExecutionContext,
        compiler: &QueryCompiler<Q>,
    ) -> Result<Option<Q>> {
        let params = PastEventParams::from_condition(condition)?;

        if let Some(key) = params.usable_counter_key() {
            debug!(counter_key = key, "compiling past-event condition against stored counters");
            return compiler.compile(&params.counter_condition(key), context);
        }

        let provider = compiler.past_event_ids().ok_or_else(|| {
            CompileError::NoPastEventIdsProvider(condition.condition_type_id.clone())
        })?;
        let event_query = compiler
            .compile(&params.event_condition(None), context)?
            .unwrap_or_else(Q::match_all);
        let ids = provider
            .profile_ids_with_event_count(
                &event_query,
                params.effective_minimum(),
                params.effective_maximum(),
            )
            .map_err(|e| CompileError::PastEventIds(format!("{:#}", e)))?;
        debug!(profiles = ids.len(), "past-event condition resolved to profile ids");

        compiler.compile(&ConditionBuilder::ids(ids, params.events_occurred), context)
    }
}

#[cfg(test)]
mod tests {
    use crate::builders::test_support::builtin_compiler;
    use crate::compiler::PastEventIdsProvider;
    use crate::error::CompileError;
    use crate::query::SearchQuery;
    use condex_core::past_event::generated_property_key;
    use condex_core::{ConditionBuilder, EngineConfig, ExecutionContext, Value};
    use std::sync::{Arc, Mutex};

    struct FixedIds {
        ids: Vec<String>,
        seen: Mutex<Vec<(u64, u64)>>,
    }

    impl PastEventIdsProvider<SearchQuery> for FixedIds {
        fn profile_ids_with_event_count(
            &self,
            _event_query: &SearchQuery,
            minimum: u64,
            maximum: u64,
        ) -> anyhow::Result<Vec<String>> {
            self.seen.lock().unwrap().push((minimum, maximum));
            Ok(self.ids.clone())
        }
    }

    fn fixed(ids: &[&str]) -> Arc<FixedIds> {
        Arc::new(FixedIds {
            ids: ids.iter().map(|s| s.to_string()).collect(),
            seen: Mutex::new(Vec::new()),
        })
    }

    #[test]
    fn test_counter_key_compiles_to_counter_query() {
        let event = ConditionBuilder::event_type("purchase");
        let key = generated_property_key(&event, Some(30), None, None);
        let condition = ConditionBuilder::past_event(event)
            .with_parameter("numberOfDays", 30)
            .with_parameter("generatedPropertyKey", key.clone());

        let query = builtin_compiler()
            .compile(&condition, &ExecutionContext::new())
            .unwrap()
            .unwrap();
        let SearchQuery::Nested { path, query } = query else {
            panic!("expected a nested counter query");
        };
        assert_eq!(path, "systemProperties.pastEvents");
        assert!(query.to_json().to_string().contains(&key));
    }

    #[test]
    fn test_ids_lookup_without_counter() {
        let provider = fixed(&["p1", "p2"]);
        let compiler = builtin_compiler().with_past_event_ids(provider.clone());
        let condition = ConditionBuilder::past_event(ConditionBuilder::event_type("purchase"))
            .with_parameter("minimumEventCount", 2);

        let query = compiler.compile(&condition, &ExecutionContext::new()).unwrap();
        assert_eq!(
            query,
            Some(SearchQuery::ids(vec!["p1".to_string(), "p2".to_string()]))
        );
        assert_eq!(provider.seen.lock().unwrap()[0], (2, u64::MAX));
    }

    #[test]
    fn test_events_not_occurred_excludes_ids() {
        let compiler = builtin_compiler().with_past_event_ids(fixed(&["p1"]));
        let condition = ConditionBuilder::past_event(ConditionBuilder::event_type("purchase"))
            .with_parameter("operator", "eventsNotOccurred");

        let query = compiler.compile(&condition, &ExecutionContext::new()).unwrap();
        assert_eq!(
            query,
            Some(SearchQuery::negate(SearchQuery::ids(vec!["p1".to_string()])))
        );
    }

    #[test]
    fn test_id_lookup_is_bounded() {
        let compiler = builtin_compiler()
            .with_config(EngineConfig::default().with_max_ids_query_count(1))
            .with_past_event_ids(fixed(&["p1", "p2"]));
        let condition = ConditionBuilder::past_event(ConditionBuilder::event_type("purchase"));
        assert!(matches!(
            compiler.compile(&condition, &ExecutionContext::new()),
            Err(CompileError::TooManyIds { count: 2, max: 1 })
        ));
    }

    #[test]
    fn test_no_provider() {
        let condition = ConditionBuilder::past_event(ConditionBuilder::event_type("purchase"))
            .with_parameter("generatedPropertyKey", Value::from("eventTriggeredstale"));
        assert!(matches!(
            builtin_compiler().compile(&condition, &ExecutionContext::new()),
            Err(CompileError::NoPastEventIdsProvider(_))
        ));
    }
}
