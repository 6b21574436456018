//! Built-in condition evaluators

mod basic;
mod geo;
mod ids;
mod logical;
mod nested;
mod past_event;
mod property;
mod source_event;

pub use basic::{EventTypeConditionEvaluator, MatchAllConditionEvaluator};
pub use geo::GeoLocationByPointSessionConditionEvaluator;
pub use ids::IdsConditionEvaluator;
pub use logical::{BooleanConditionEvaluator, NotConditionEvaluator};
pub use nested::NestedConditionEvaluator;
pub use past_event::PastEventConditionEvaluator;
pub use property::PropertyConditionEvaluator;
pub use source_event::SourceEventPropertyConditionEvaluator;

use crate::dispatcher::ConditionEvaluator;
use std::sync::Arc;

/// Evaluator keys of the built-in condition types
pub mod keys {
    pub const BOOLEAN: &str = "booleanConditionEvaluator";
    pub const NOT: &str = "notConditionEvaluator";
    pub const NESTED: &str = "nestedConditionEvaluator";
    pub const IDS: &str = "idsConditionEvaluator";
    pub const MATCH_ALL: &str = "matchAllConditionEvaluator";
    pub const EVENT_TYPE: &str = "eventTypeConditionEvaluator";
    pub const PROPERTY: &str = "propertyConditionEvaluator";
    pub const GEO: &str = "geoLocationByPointSessionConditionEvaluator";
    pub const PAST_EVENT: &str = "pastEventConditionEvaluator";
    pub const SOURCE_EVENT_PROPERTY: &str = "sourceEventPropertyConditionEvaluator";
}

/// Every built-in evaluator with the key it is registered under
pub fn builtin_evaluators() -> Vec<(&'static str, Arc<dyn ConditionEvaluator>)> {
    vec![
        entry(keys::BOOLEAN, BooleanConditionEvaluator),
        entry(keys::NOT, NotConditionEvaluator),
        entry(keys::NESTED, NestedConditionEvaluator),
        entry(keys::IDS, IdsConditionEvaluator),
        entry(keys::MATCH_ALL, MatchAllConditionEvaluator),
        entry(keys::EVENT_TYPE, EventTypeConditionEvaluator),
        entry(keys::PROPERTY, PropertyConditionEvaluator),
        entry(keys::GEO, GeoLocationByPointSessionConditionEvaluator),
        entry(keys::PAST_EVENT, PastEventConditionEvaluator),
        entry(keys::SOURCE_EVENT_PROPERTY, SourceEventPropertyConditionEvaluator),
    ]
}

fn entry(
    key: &'static str,
    evaluator: impl ConditionEvaluator + 'static,
) -> (&'static str, Arc<dyn ConditionEvaluator>) {
    let evaluator: Arc<dyn ConditionEvaluator> = Arc::new(evaluator);
    (key, evaluator)
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::dispatcher::ConditionEvaluatorDispatcher;
    use condex_core::ConditionTypeRegistry;
    use std::sync::Arc;

    /// Dispatcher over the built-in types and evaluators
    pub fn builtin_dispatcher() -> ConditionEvaluatorDispatcher {
        let registry = ConditionTypeRegistry::with_builtin_types().unwrap();
        ConditionEvaluatorDispatcher::new(Arc::new(registry)).with_builtin_evaluators()
    }
}
