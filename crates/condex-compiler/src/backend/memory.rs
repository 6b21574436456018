//! In-memory reference backend
//!
//! Interprets [`SearchQuery`] trees directly over stored items, with the
//! same comparison rules as direct evaluation. Useful as a test double for a
//! real search store and as the reference for what a compiled query means.

use super::QueryExecutor;
use crate::compiler::PastEventIdsProvider;
use crate::query::{BoolQuery, RangeQuery, SearchQuery};
use condex_core::compare::{compare_values, regex_matches, text_of, values_equal};
use condex_core::geo::{GeoPoint, GeoShape};
use condex_core::item::EVENT_ITEM_TYPE;
use condex_core::{Item, Value};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::RwLock;
use tracing::debug;

/// Items grouped by type, then by id
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    items: RwLock<BTreeMap<String, BTreeMap<String, Item>>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `item`, replacing any item of the same type and id
    pub fn insert(&self, item: Item) {
        let mut items = self.items.write().unwrap_or_else(|e| e.into_inner());
        items
            .entry(item.item_type.clone())
            .or_default()
            .insert(item.item_id.clone(), item);
    }

    pub fn insert_all(&self, items: impl IntoIterator<Item = Item>) {
        for item in items {
            self.insert(item);
        }
    }

    pub fn remove(&self, item_type: &str, item_id: &str) -> Option<Item> {
        let mut items = self.items.write().unwrap_or_else(|e| e.into_inner());
        items.get_mut(item_type)?.remove(item_id)
    }

    pub fn get(&self, item_type: &str, item_id: &str) -> Option<Item> {
        let items = self.items.read().unwrap_or_else(|e| e.into_inner());
        items.get(item_type)?.get(item_id).cloned()
    }

    pub fn len(&self) -> usize {
        let items = self.items.read().unwrap_or_else(|e| e.into_inner());
        items.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `item` is selected by `query`
    pub fn matches(query: &SearchQuery, item: &Item) -> bool {
        match query {
            SearchQuery::MatchAll => true,
            SearchQuery::MatchNone => false,
            SearchQuery::Bool(b) => bool_matches(b, item),
            SearchQuery::Term { field, value } => {
                item.values(field).iter().any(|v| values_equal(v, value))
            }
            SearchQuery::Terms { field, values } => item
                .values(field)
                .iter()
                .any(|v| values.iter().any(|expected| values_equal(v, expected))),
            SearchQuery::Ids { values } => values.iter().any(|id| *id == item.item_id),
            SearchQuery::Range(range) => item.values(&range.field).iter().any(|v| in_range(range, v)),
            SearchQuery::Exists { field } => !item.values(field).is_empty(),
            SearchQuery::Prefix { field, value } => {
                text_values(item, field).any(|text| text.starts_with(value.as_str()))
            }
            SearchQuery::Wildcard { field, value } => {
                let pattern: Vec<WildcardToken> = wildcard_tokens(value);
                text_values(item, field).any(|text| wildcard_matches(&pattern, &text))
            }
            SearchQuery::Regexp { field, value } => {
                text_values(item, field).any(|text| regex_matches(value, &text).unwrap_or(false))
            }
            SearchQuery::Nested { path, query } => nested_matches(path, query, item),
            SearchQuery::GeoDistance {
                field,
                center,
                distance_meters,
            } => geo_matches(
                item,
                field,
                &GeoShape::Circle {
                    center: *center,
                    radius_meters: *distance_meters,
                },
            ),
            SearchQuery::GeoBoundingBox {
                field,
                north_east,
                south_west,
            } => geo_matches(
                item,
                field,
                &GeoShape::Rectangle {
                    north_east: *north_east,
                    south_west: *south_west,
                },
            ),
        }
    }
}

impl QueryExecutor<SearchQuery> for InMemoryBackend {
    fn query(&self, query: &SearchQuery, item_type: &str) -> anyhow::Result<Vec<Item>> {
        let items = self.items.read().unwrap_or_else(|e| e.into_inner());
        let matched: Vec<Item> = items
            .get(item_type)
            .map(|by_id| {
                by_id
                    .values()
                    .filter(|item| Self::matches(query, item))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        debug!(item_type, matched = matched.len(), "in-memory query");
        Ok(matched)
    }

    fn count(&self, query: &SearchQuery, item_type: &str) -> anyhow::Result<u64> {
        let items = self.items.read().unwrap_or_else(|e| e.into_inner());
        Ok(items
            .get(item_type)
            .map(|by_id| by_id.values().filter(|item| Self::matches(query, item)).count())
            .unwrap_or(0) as u64)
    }
}

impl PastEventIdsProvider<SearchQuery> for InMemoryBackend {
    fn profile_ids_with_event_count(
        &self,
        event_query: &SearchQuery,
        minimum: u64,
        maximum: u64,
    ) -> anyhow::Result<Vec<String>> {
        let mut per_profile: BTreeMap<String, u64> = BTreeMap::new();
        for event in self.query(event_query, EVENT_ITEM_TYPE)? {
            if let Some(profile_id) = event.lookup("profileId").as_ref().and_then(Value::as_str) {
                *per_profile.entry(profile_id.to_string()).or_default() += 1;
            }
        }
        Ok(per_profile
            .into_iter()
            .filter(|(_, count)| (minimum..=maximum).contains(count))
            .map(|(profile_id, _)| profile_id)
            .collect())
    }
}

fn bool_matches(b: &BoolQuery, item: &Item) -> bool {
    b.must.iter().all(|q| InMemoryBackend::matches(q, item))
        && b.filter.iter().all(|q| InMemoryBackend::matches(q, item))
        && !b.must_not.iter().any(|q| InMemoryBackend::matches(q, item))
        && b.should
            .iter()
            .filter(|q| InMemoryBackend::matches(q, item))
            .count()
            >= b.required_should()
}

fn in_range(range: &RangeQuery, actual: &Value) -> bool {
    let holds = |bound: &Option<Value>, accepted: &[Ordering]| match bound {
        None => true,
        Some(bound) => compare_values(actual, bound).is_some_and(|o| accepted.contains(&o)),
    };
    holds(&range.gt, &[Ordering::Greater])
        && holds(&range.gte, &[Ordering::Greater, Ordering::Equal])
        && holds(&range.lt, &[Ordering::Less])
        && holds(&range.lte, &[Ordering::Less, Ordering::Equal])
}

fn text_values(item: &Item, field: &str) -> impl Iterator<Item = String> {
    item.values(field).into_iter().filter_map(|v| text_of(&v))
}

fn nested_matches(path: &str, query: &SearchQuery, item: &Item) -> bool {
    item.values(path)
        .into_iter()
        .filter(|element| matches!(element, Value::Object(_)))
        .any(|element| InMemoryBackend::matches(query, &item.scoped_to(path, element)))
}

fn geo_matches(item: &Item, field: &str, shape: &GeoShape) -> bool {
    item.values(field)
        .iter()
        .filter_map(GeoPoint::from_value)
        .any(|point| shape.contains(&point))
}

#[derive(Debug, Clone, PartialEq)]
enum WildcardToken {
    Literal(char),
    AnyOne,
    AnyRun,
}

fn wildcard_tokens(pattern: &str) -> Vec<WildcardToken> {
    let mut tokens = Vec::new();
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        tokens.push(match c {
            '\\' => match chars.next() {
                Some(escaped) => WildcardToken::Literal(escaped),
                None => WildcardToken::Literal('\\'),
            },
            '*' => WildcardToken::AnyRun,
            '?' => WildcardToken::AnyOne,
            other => WildcardToken::Literal(other),
        });
    }
    tokens
}

/// Iterative glob match with single-star backtracking
fn wildcard_matches(pattern: &[WildcardToken], text: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let (mut p, mut t) = (0, 0);
    let mut star: Option<(usize, usize)> = None;
    while t < text.len() {
        match pattern.get(p) {
            Some(WildcardToken::AnyRun) => {
                star = Some((p, t));
                p += 1;
            }
            Some(WildcardToken::AnyOne) => {
                p += 1;
                t += 1;
            }
            Some(WildcardToken::Literal(c)) if *c == text[t] => {
                p += 1;
                t += 1;
            }
            _ => match star {
                Some((star_p, star_t)) => {
                    p = star_p + 1;
                    t = star_t + 1;
                    star = Some((star_p, star_t + 1));
                }
                None => return false,
            },
        }
    }
    pattern[p..].iter().all(|token| *token == WildcardToken::AnyRun)
}
