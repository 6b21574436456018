//! Subject Items
//!
//! An [`Item`] is the in-memory object a condition is tested against:
//! a profile, a session, an event, or any other typed record.
//!
//! Property paths use dot notation. `itemId`, `itemType` and `scope` read the
//! intrinsic fields, `source.<path>` descends into the source item, and every
//! other path walks the `data` map. A path that crosses a list collects the
//! value of every element, the way a search engine treats multi-valued
//! fields.

use crate::types::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const PROFILE_ITEM_TYPE: &str = "profile";
pub const SESSION_ITEM_TYPE: &str = "session";
pub const EVENT_ITEM_TYPE: &str = "event";

/// `sourceEventPropertyCondition` filters and the subject path each one
/// tests. Every path goes through the subject's source item, so a subject
/// without a source never satisfies a filter.
pub const SOURCE_EVENT_FIELDS: [(&str, &str); 4] = [
    ("id", "source.itemId"),
    ("path", "source.properties.pageInfo.pagePath"),
    ("type", "source.itemType"),
    ("scope", "source.scope"),
];

/// A typed record conditions are evaluated against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub item_id: String,

    pub item_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// Source item (for events: the page, site or form that produced them)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Box<Item>>,

    /// Everything else: `properties`, `systemProperties`, `eventType`, ...
    #[serde(flatten)]
    pub data: BTreeMap<String, Value>,
}

impl Item {
    pub fn new(item_type: impl Into<String>, item_id: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
            item_type: item_type.into(),
            scope: None,
            source: None,
            data: BTreeMap::new(),
        }
    }

    pub fn profile(profile_id: impl Into<String>) -> Self {
        Self::new(PROFILE_ITEM_TYPE, profile_id)
    }

    pub fn session(session_id: impl Into<String>, profile_id: impl Into<String>) -> Self {
        Self::new(SESSION_ITEM_TYPE, session_id).with_field("profileId", profile_id.into())
    }

    pub fn event(
        event_id: impl Into<String>,
        event_type: impl Into<String>,
        profile_id: impl Into<String>,
    ) -> Self {
        Self::new(EVENT_ITEM_TYPE, event_id)
            .with_field("eventType", event_type.into())
            .with_field("profileId", profile_id.into())
    }

    pub fn is_event(&self) -> bool {
        self.item_type == EVENT_ITEM_TYPE
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn with_source(mut self, source: Item) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Set `properties.<name>`
    pub fn with_property(self, name: &str, value: impl Into<Value>) -> Self {
        self.with_field(&format!("properties.{}", name), value)
    }

    /// Set a value at a dotted data path, creating intermediate objects
    pub fn with_field(mut self, path: &str, value: impl Into<Value>) -> Self {
        self.set(path, value.into());
        self
    }

    /// Event timestamp, stored as `timeStamp`
    pub fn with_timestamp(self, timestamp: chrono::DateTime<chrono::Utc>) -> Self {
        self.with_field("timeStamp", timestamp.to_rfc3339())
    }

    /// Set a value at a dotted data path. Intrinsic fields are not settable
    /// through paths; non-object intermediates are replaced by objects.
    pub fn set(&mut self, path: &str, value: Value) {
        let mut segments = path.split('.').peekable();
        let mut current = &mut self.data;
        while let Some(segment) = segments.next() {
            if segments.peek().is_none() {
                current.insert(segment.to_string(), value);
                return;
            }
            let slot = current
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(BTreeMap::new()));
            if !matches!(slot, Value::Object(_)) {
                *slot = Value::Object(BTreeMap::new());
            }
            current = match slot {
                Value::Object(map) => map,
                _ => return,
            };
        }
    }

    /// Value at a property path, `None` when absent or null
    pub fn lookup(&self, path: &str) -> Option<Value> {
        match path {
            "itemId" => return Some(Value::String(self.item_id.clone())),
            "itemType" => return Some(Value::String(self.item_type.clone())),
            "scope" => return self.scope.clone().map(Value::String),
            _ => {}
        }
        if let Some(rest) = path.strip_prefix("source.") {
            return self.source.as_ref().and_then(|source| source.lookup(rest));
        }

        let mut segments = path.split('.');
        let first = segments.next()?;
        let rest: Vec<&str> = segments.collect();
        lookup_in(self.data.get(first)?, &rest)
    }

    /// Multi-valued view of a path: list values are flattened, a missing
    /// path yields nothing
    pub fn values(&self, path: &str) -> Vec<Value> {
        let mut out = Vec::new();
        if let Some(value) = self.lookup(path) {
            flatten_into(value, &mut out);
        }
        out
    }

    /// Copy of this item whose data holds only `value` at `path`.
    /// Intrinsic fields and the source are kept.
    pub fn scoped_to(&self, path: &str, value: Value) -> Item {
        let mut scoped = Item {
            item_id: self.item_id.clone(),
            item_type: self.item_type.clone(),
            scope: self.scope.clone(),
            source: self.source.clone(),
            data: BTreeMap::new(),
        };
        scoped.set(path, value);
        scoped
    }
}

fn lookup_in(value: &Value, segments: &[&str]) -> Option<Value> {
    if value.is_null() {
        return None;
    }
    let Some((head, tail)) = segments.split_first() else {
        return Some(value.clone());
    };
    match value {
        Value::Object(map) => lookup_in(map.get(*head)?, tail),
        Value::Array(items) => {
            let mut collected = Vec::new();
            for element in items {
                if let Some(found) = lookup_in(element, segments) {
                    flatten_into(found, &mut collected);
                }
            }
            if collected.is_empty() {
                None
            } else {
                Some(Value::Array(collected))
            }
        }
        _ => None,
    }
}

fn flatten_into(value: Value, out: &mut Vec<Value>) {
    match value {
        Value::Array(items) => {
            for item in items {
                flatten_into(item, out);
            }
        }
        Value::Null => {}
        other => out.push(other),
    }
}
