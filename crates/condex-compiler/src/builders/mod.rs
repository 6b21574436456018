//! Built-in query builders

mod basic;
mod geo;
mod ids;
mod logical;
mod nested;
mod past_event;
mod property;
mod source_event;

pub use basic::{EventTypeConditionQueryBuilder, MatchAllConditionQueryBuilder};
pub use geo::GeoLocationByPointSessionConditionQueryBuilder;
pub use ids::IdsConditionQueryBuilder;
pub use logical::{BooleanConditionQueryBuilder, NotConditionQueryBuilder};
pub use nested::NestedConditionQueryBuilder;
pub use past_event::PastEventConditionQueryBuilder;
pub use property::PropertyConditionQueryBuilder;
pub use source_event::SourceEventPropertyConditionQueryBuilder;

use crate::compiler::ConditionQueryBuilder;
use crate::query::SearchQuery;
use std::sync::Arc;

/// Query builder keys of the built-in condition types
pub mod keys {
    pub const BOOLEAN: &str = "booleanConditionQueryBuilder";
    pub const NOT: &str = "notConditionQueryBuilder";
    pub const NESTED: &str = "nestedConditionQueryBuilder";
    pub const IDS: &str = "idsConditionQueryBuilder";
    pub const MATCH_ALL: &str = "matchAllConditionQueryBuilder";
    pub const EVENT_TYPE: &str = "eventTypeConditionQueryBuilder";
    pub const PROPERTY: &str = "propertyConditionQueryBuilder";
    pub const GEO: &str = "geoLocationByPointSessionConditionQueryBuilder";
    pub const PAST_EVENT: &str = "pastEventConditionQueryBuilder";
    pub const SOURCE_EVENT_PROPERTY: &str = "sourceEventPropertyConditionQueryBuilder";
}

/// Every built-in [`SearchQuery`] builder with the key it is registered under
pub fn builtin_query_builders() -> Vec<(&'static str, Arc<dyn ConditionQueryBuilder<SearchQuery>>)>
{
    vec![
        entry(keys::BOOLEAN, BooleanConditionQueryBuilder),
        entry(keys::NOT, NotConditionQueryBuilder),
        entry(keys::NESTED, NestedConditionQueryBuilder),
        entry(keys::IDS, IdsConditionQueryBuilder),
        entry(keys::MATCH_ALL, MatchAllConditionQueryBuilder),
        entry(keys::EVENT_TYPE, EventTypeConditionQueryBuilder),
        entry(keys::PROPERTY, PropertyConditionQueryBuilder),
        entry(keys::GEO, GeoLocationByPointSessionConditionQueryBuilder),
        entry(keys::PAST_EVENT, PastEventConditionQueryBuilder),
        entry(keys::SOURCE_EVENT_PROPERTY, SourceEventPropertyConditionQueryBuilder),
    ]
}

fn entry(
    key: &'static str,
    builder: impl ConditionQueryBuilder<SearchQuery> + 'static,
) -> (&'static str, Arc<dyn ConditionQueryBuilder<SearchQuery>>) {
    let builder: Arc<dyn ConditionQueryBuilder<SearchQuery>> = Arc::new(builder);
    (key, builder)
}
