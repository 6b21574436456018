//! Search query DSL
//!
//! [`SearchQuery`] is the backend-neutral query tree the built-in builders
//! produce. It serializes to the JSON shape of the Elasticsearch / OpenSearch
//! query DSL so it can be shipped to such a store as-is; the in-memory
//! backend interprets it directly.

use condex_core::geo::GeoPoint;
use condex_core::Value;
use serde::{Serialize, Serializer};
use serde_json::{json, Map};

/// Query type a [`QueryCompiler`](crate::QueryCompiler) produces.
///
/// The compiler only needs the two constant queries; everything else is up
/// to the builders registered for the target.
pub trait QueryTarget: Clone + Send + Sync + 'static {
    /// Matches every item
    fn match_all() -> Self;

    /// Matches no item
    fn match_none() -> Self;
}

/// Backend search query
#[derive(Debug, Clone, PartialEq)]
pub enum SearchQuery {
    MatchAll,
    MatchNone,
    Bool(BoolQuery),
    /// Exact value of a field
    Term { field: String, value: Value },
    /// Any of the listed values
    Terms { field: String, values: Vec<Value> },
    /// Item identifiers
    Ids { values: Vec<String> },
    Range(RangeQuery),
    Exists { field: String },
    Prefix { field: String, value: String },
    /// `*` and `?` wildcards; `\` escapes the next character
    Wildcard { field: String, value: String },
    /// Whole-value regular expression
    Regexp { field: String, value: String },
    /// Query run against each object of the list at `path`
    Nested { path: String, query: Box<SearchQuery> },
    GeoDistance {
        field: String,
        center: GeoPoint,
        distance_meters: f64,
    },
    GeoBoundingBox {
        field: String,
        north_east: GeoPoint,
        south_west: GeoPoint,
    },
}

/// Boolean combination of queries
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoolQuery {
    pub must: Vec<SearchQuery>,
    pub should: Vec<SearchQuery>,
    pub must_not: Vec<SearchQuery>,
    pub filter: Vec<SearchQuery>,
    pub minimum_should_match: Option<usize>,
}

impl BoolQuery {
    /// Number of `should` clauses that have to match. Without `must` or
    /// `filter` clauses at least one does.
    pub fn required_should(&self) -> usize {
        if self.should.is_empty() {
            return 0;
        }
        self.minimum_should_match.unwrap_or(
            if self.must.is_empty() && self.filter.is_empty() {
                1
            } else {
                0
            },
        )
    }
}

/// Range over one field. Each bound is optional.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RangeQuery {
    pub field: String,
    pub gt: Option<Value>,
    pub gte: Option<Value>,
    pub lt: Option<Value>,
    pub lte: Option<Value>,
}

impl RangeQuery {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            ..Default::default()
        }
    }

    pub fn gt(mut self, value: Value) -> Self {
        self.gt = Some(value);
        self
    }

    pub fn gte(mut self, value: Value) -> Self {
        self.gte = Some(value);
        self
    }

    pub fn lt(mut self, value: Value) -> Self {
        self.lt = Some(value);
        self
    }

    pub fn lte(mut self, value: Value) -> Self {
        self.lte = Some(value);
        self
    }
}

impl SearchQuery {
    pub fn term(field: impl Into<String>, value: impl Into<Value>) -> Self {
        SearchQuery::Term {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn terms(field: impl Into<String>, values: Vec<Value>) -> Self {
        SearchQuery::Terms {
            field: field.into(),
            values,
        }
    }

    pub fn exists(field: impl Into<String>) -> Self {
        SearchQuery::Exists {
            field: field.into(),
        }
    }

    pub fn ids(values: Vec<String>) -> Self {
        SearchQuery::Ids { values }
    }

    pub fn nested(path: impl Into<String>, query: SearchQuery) -> Self {
        SearchQuery::Nested {
            path: path.into(),
            query: Box::new(query),
        }
    }

    /// All of `queries`; a single query is returned unwrapped
    pub fn all_of(mut queries: Vec<SearchQuery>) -> Self {
        if queries.len() == 1 {
            return queries.remove(0);
        }
        SearchQuery::Bool(BoolQuery {
            must: queries,
            ..Default::default()
        })
    }

    /// At least one of `queries`; a single query is returned unwrapped
    pub fn any_of(mut queries: Vec<SearchQuery>) -> Self {
        if queries.len() == 1 {
            return queries.remove(0);
        }
        SearchQuery::Bool(BoolQuery {
            should: queries,
            minimum_should_match: Some(1),
            ..Default::default()
        })
    }

    pub fn negate(query: SearchQuery) -> Self {
        SearchQuery::Bool(BoolQuery {
            must_not: vec![query],
            ..Default::default()
        })
    }

    /// `query` must not match, on items where `field` is present
    pub fn present_and_not(field: impl Into<String>, query: SearchQuery) -> Self {
        SearchQuery::Bool(BoolQuery {
            must: vec![SearchQuery::exists(field)],
            must_not: vec![query],
            ..Default::default()
        })
    }

    /// Elasticsearch JSON rendition
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            SearchQuery::MatchAll => json!({ "match_all": {} }),
            SearchQuery::MatchNone => json!({ "match_none": {} }),
            SearchQuery::Bool(b) => {
                let mut body = Map::new();
                for (name, clauses) in [
                    ("must", &b.must),
                    ("should", &b.should),
                    ("must_not", &b.must_not),
                    ("filter", &b.filter),
                ] {
                    if !clauses.is_empty() {
                        body.insert(
                            name.to_string(),
                            clauses.iter().map(SearchQuery::to_json).collect(),
                        );
                    }
                }
                if let Some(min) = b.minimum_should_match {
                    body.insert("minimum_should_match".to_string(), json!(min));
                }
                json!({ "bool": body })
            }
            SearchQuery::Term { field, value } => json!({ "term": { field: value_json(value) } }),
            SearchQuery::Terms { field, values } => {
                let values: Vec<_> = values.iter().map(value_json).collect();
                json!({ "terms": { field: values } })
            }
            SearchQuery::Ids { values } => json!({ "ids": { "values": values } }),
            SearchQuery::Range(range) => {
                let mut bounds = Map::new();
                for (name, bound) in [
                    ("gt", &range.gt),
                    ("gte", &range.gte),
                    ("lt", &range.lt),
                    ("lte", &range.lte),
                ] {
                    if let Some(bound) = bound {
                        bounds.insert(name.to_string(), value_json(bound));
                    }
                }
                json!({ "range": { range.field.clone(): bounds } })
            }
            SearchQuery::Exists { field } => json!({ "exists": { "field": field } }),
            SearchQuery::Prefix { field, value } => json!({ "prefix": { field: value } }),
            SearchQuery::Wildcard { field, value } => json!({ "wildcard": { field: value } }),
            SearchQuery::Regexp { field, value } => json!({ "regexp": { field: value } }),
            SearchQuery::Nested { path, query } => {
                json!({ "nested": { "path": path, "query": query.to_json() } })
            }
            SearchQuery::GeoDistance {
                field,
                center,
                distance_meters,
            } => json!({
                "geo_distance": {
                    "distance": format!("{}m", distance_meters),
                    field: { "lat": center.lat, "lon": center.lon },
                }
            }),
            SearchQuery::GeoBoundingBox {
                field,
                north_east,
                south_west,
            } => json!({
                "geo_bounding_box": {
                    field: {
                        "top_left": { "lat": north_east.lat, "lon": south_west.lon },
                        "bottom_right": { "lat": south_west.lat, "lon": north_east.lon },
                    }
                }
            }),
        }
    }
}

impl QueryTarget for SearchQuery {
    fn match_all() -> Self {
        SearchQuery::MatchAll
    }

    fn match_none() -> Self {
        SearchQuery::MatchNone
    }
}

impl Serialize for SearchQuery {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

fn value_json(value: &Value) -> serde_json::Value {
    serde_json::to_value(value).unwrap_or(serde_json::Value::Null)
}

/// Escape `*`, `?` and `\` so `text` matches literally inside a wildcard
pub fn escape_wildcard(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '*' | '?' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
