//! Legacy query-builder ids
//!
//! Condition types authored against the older naming convention declare
//! builder keys such as `idsConditionESQueryBuilder`. This table maps them to
//! the current keys. It is the single shared table: every query compiler
//! consults it, whatever its backend target.

use std::collections::HashMap;
use std::sync::LazyLock;

static LEGACY_QUERY_BUILDER_IDS: LazyLock<HashMap<&'static str, &'static str>> =
    LazyLock::new(|| {
        HashMap::from([
            ("booleanConditionESQueryBuilder", "booleanConditionQueryBuilder"),
            ("notConditionESQueryBuilder", "notConditionQueryBuilder"),
            ("nestedConditionESQueryBuilder", "nestedConditionQueryBuilder"),
            ("idsConditionESQueryBuilder", "idsConditionQueryBuilder"),
            ("matchAllConditionESQueryBuilder", "matchAllConditionQueryBuilder"),
            ("eventTypeConditionESQueryBuilder", "eventTypeConditionQueryBuilder"),
            ("propertyConditionESQueryBuilder", "propertyConditionQueryBuilder"),
            (
                "geoLocationByPointSessionConditionESQueryBuilder",
                "geoLocationByPointSessionConditionQueryBuilder",
            ),
            ("pastEventConditionESQueryBuilder", "pastEventConditionQueryBuilder"),
            (
                "sourceEventPropertyConditionESQueryBuilder",
                "sourceEventPropertyConditionQueryBuilder",
            ),
        ])
    });

/// Current builder id for a legacy one, if the id is in the table
pub fn resolve_legacy_builder_id(legacy_id: &str) -> Option<&'static str> {
    LEGACY_QUERY_BUILDER_IDS.get(legacy_id).copied()
}

/// All legacy -> current pairs, sorted by legacy id
pub fn legacy_builder_ids() -> Vec<(&'static str, &'static str)> {
    let mut pairs: Vec<_> = LEGACY_QUERY_BUILDER_IDS
        .iter()
        .map(|(k, v)| (*k, *v))
        .collect();
    pairs.sort();
    pairs
}
