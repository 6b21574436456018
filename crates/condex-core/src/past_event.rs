//! Past-event condition support
//!
//! A past-event condition matches profiles by how many events matching an
//! inner event condition they produced over a time window. Two sources of
//! truth exist for that count:
//!
//! - a pre-computed counter on the profile, stored under
//!   `systemProperties.pastEvents` as `[{key, count}]` and keyed by a stable
//!   hash of the condition
//! - a live count over stored events
//!
//! This module holds what evaluation and compilation share: parameter
//! parsing, key generation, and the synthesized counter and event
//! conditions.

use crate::condition::{Condition, ConditionBuilder};
use crate::context::ExecutionContext;
use crate::error::{CoreError, Result};
use crate::item::Item;
use crate::types::Value;
use std::collections::BTreeMap;

pub const PAST_EVENT_CONDITION_TYPE: &str = "pastEventCondition";
pub const PAST_EVENTS_PATH: &str = "systemProperties.pastEvents";
pub const GENERATED_KEY_PREFIX: &str = "eventTriggered";

const OPERATOR_OCCURRED: &str = "eventsOccurred";
const OPERATOR_NOT_OCCURRED: &str = "eventsNotOccurred";

/// Live event counting for subjects without a pre-computed counter
pub trait PastEventCounter: Send + Sync {
    /// Number of stored events matching `event_condition`
    fn count_events(
        &self,
        event_condition: &Condition,
        context: &ExecutionContext,
    ) -> anyhow::Result<u64>;
}

/// Parsed parameters of a past-event condition
#[derive(Debug, Clone, PartialEq)]
pub struct PastEventParams<'a> {
    pub event_condition: &'a Condition,
    /// `true` for `eventsOccurred`, `false` for `eventsNotOccurred`
    pub events_occurred: bool,
    pub minimum_event_count: Option<u64>,
    pub maximum_event_count: Option<u64>,
    pub number_of_days: Option<i64>,
    pub from_date: Option<&'a Value>,
    pub to_date: Option<&'a Value>,
    pub generated_property_key: Option<&'a str>,
}

impl<'a> PastEventParams<'a> {
    pub fn from_condition(condition: &'a Condition) -> Result<Self> {
        let event_condition = condition
            .condition_parameter("eventCondition")
            .ok_or_else(|| {
                CoreError::invalid_parameter(
                    &condition.condition_type_id,
                    "eventCondition",
                    "a sub-condition is required",
                )
            })?;

        let events_occurred = match condition.string_parameter("operator") {
            None | Some(OPERATOR_OCCURRED) => true,
            Some(OPERATOR_NOT_OCCURRED) => false,
            Some(other) => {
                return Err(CoreError::invalid_parameter(
                    &condition.condition_type_id,
                    "operator",
                    format!(
                        "unsupported operator '{}', use '{}' or '{}'",
                        other, OPERATOR_OCCURRED, OPERATOR_NOT_OCCURRED
                    ),
                ))
            }
        };

        Ok(Self {
            event_condition,
            events_occurred,
            minimum_event_count: count_parameter(condition, "minimumEventCount")?,
            maximum_event_count: count_parameter(condition, "maximumEventCount")?,
            number_of_days: condition.i64_parameter("numberOfDays"),
            from_date: condition.parameter("fromDate"),
            to_date: condition.parameter("toDate"),
            generated_property_key: condition.string_parameter("generatedPropertyKey"),
        })
    }

    /// Lower count bound. Occurrence always needs at least one event.
    pub fn effective_minimum(&self) -> u64 {
        if self.events_occurred {
            self.minimum_event_count.unwrap_or(1).max(1)
        } else {
            1
        }
    }

    pub fn effective_maximum(&self) -> u64 {
        if self.events_occurred {
            self.maximum_event_count.unwrap_or(u64::MAX)
        } else {
            u64::MAX
        }
    }

    /// Whether an event count satisfies the condition
    pub fn matches_count(&self, count: u64) -> bool {
        if self.events_occurred {
            count > 0 && count >= self.effective_minimum() && count <= self.effective_maximum()
        } else {
            count == 0
        }
    }

    /// Stable key of this condition's counter
    pub fn computed_key(&self) -> String {
        generated_property_key(
            self.event_condition,
            self.number_of_days,
            self.from_date,
            self.to_date,
        )
    }

    /// The declared key, when it matches the computed one. A key computed
    /// for different parameters would point at the wrong counter.
    pub fn usable_counter_key(&self) -> Option<&'a str> {
        self.generated_property_key
            .filter(|declared| *declared == self.computed_key())
    }

    /// Count recorded on `profile` under `key`, if any
    pub fn counter_on(profile: &Item, key: &str) -> Option<u64> {
        let counters = profile.lookup(PAST_EVENTS_PATH)?;
        let entries: Vec<&Value> = match &counters {
            Value::Array(items) => items.iter().collect(),
            single => vec![single],
        };
        entries
            .into_iter()
            .filter_map(Value::as_object)
            .find(|entry| entry.get("key").and_then(Value::as_str) == Some(key))
            .and_then(|entry| entry.get("count"))
            .and_then(Value::as_i64)
            .map(|count| count.max(0) as u64)
    }

    /// Profile condition reading the counter stored under `key`
    pub fn counter_condition(&self, key: &str) -> Condition {
        let key_equals = || {
            ConditionBuilder::profile_property(format!("{}.key", PAST_EVENTS_PATH)).equals(key)
        };
        if self.events_occurred {
            let count_in_range = ConditionBuilder::profile_property(format!(
                "{}.count",
                PAST_EVENTS_PATH
            ))
            .between(
                self.effective_minimum() as f64,
                bound_as_f64(self.effective_maximum()),
            );
            ConditionBuilder::nested(
                PAST_EVENTS_PATH,
                ConditionBuilder::and(vec![count_in_range, key_equals()]),
            )
        } else {
            let count_zero =
                ConditionBuilder::profile_property(format!("{}.count", PAST_EVENTS_PATH)).equals(0);
            ConditionBuilder::or(vec![
                ConditionBuilder::not(key_equals()),
                ConditionBuilder::nested(
                    PAST_EVENTS_PATH,
                    ConditionBuilder::and(vec![count_zero, key_equals()]),
                ),
            ])
        }
    }

    /// Event condition restricted to the time window, and to one profile
    /// when `profile_id` is given
    pub fn event_condition(&self, profile_id: Option<&str>) -> Condition {
        let mut parts = vec![self.event_condition.clone()];
        if let Some(profile_id) = profile_id {
            parts.push(ConditionBuilder::event_property("profileId").equals(profile_id));
        }
        if let Some(days) = self.number_of_days {
            parts.push(
                ConditionBuilder::event_property("timeStamp")
                    .as_date()
                    .greater_than(format!("now-{}d", days)),
            );
        }
        if let Some(from) = self.from_date {
            parts.push(
                ConditionBuilder::event_property("timeStamp")
                    .as_date()
                    .greater_than_or_equal_to(from.clone()),
            );
        }
        if let Some(to) = self.to_date {
            parts.push(
                ConditionBuilder::event_property("timeStamp")
                    .as_date()
                    .less_than_or_equal_to(to.clone()),
            );
        }
        ConditionBuilder::and(parts)
    }
}

fn count_parameter(condition: &Condition, name: &str) -> Result<Option<u64>> {
    match condition.parameter(name) {
        None => Ok(None),
        Some(value) => match value.as_i64() {
            Some(n) if n >= 0 => Ok(Some(n as u64)),
            _ => Err(CoreError::invalid_parameter(
                &condition.condition_type_id,
                name,
                format!("expected a non-negative integer, got {}", value),
            )),
        },
    }
}

/// `u64::MAX` stays unbounded when handed to a query as a number
fn bound_as_f64(bound: u64) -> f64 {
    if bound == u64::MAX {
        i64::MAX as f64
    } else {
        bound as f64
    }
}

/// `"eventTriggered" + md5(json)` over `{condition, numberOfDays, fromDate?,
/// toDate?}`. Keys are serialized in sorted order so the hash is stable.
pub fn generated_property_key(
    event_condition: &Condition,
    number_of_days: Option<i64>,
    from_date: Option<&Value>,
    to_date: Option<&Value>,
) -> String {
    let mut fields = BTreeMap::new();
    fields.insert("condition", event_condition.to_json());
    fields.insert(
        "numberOfDays",
        number_of_days.map_or(serde_json::Value::Null, serde_json::Value::from),
    );
    if let Some(from) = from_date {
        fields.insert("fromDate", from.to_json());
    }
    if let Some(to) = to_date {
        fields.insert("toDate", to.to_json());
    }
    // serde_json maps are sorted unless `preserve_order` is enabled
    let json = serde_json::to_string(&fields).unwrap_or_default();
    format!("{}{:x}", GENERATED_KEY_PREFIX, md5::compute(json.as_bytes()))
}
