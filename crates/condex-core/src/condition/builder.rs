//! Fluent condition construction
//!
//! ```
//! use condex_core::condition::ConditionBuilder;
//!
//! let adult_in_france = ConditionBuilder::and(vec![
//!     ConditionBuilder::profile_property("properties.age").greater_than(18),
//!     ConditionBuilder::profile_property("properties.country").equals("FR"),
//! ]);
//! assert_eq!(adult_in_france.condition_type_id, "booleanCondition");
//! ```

use super::Condition;
use crate::types::Value;

/// Entry points for building the built-in condition kinds
pub struct ConditionBuilder;

impl ConditionBuilder {
    pub fn and(conditions: impl IntoIterator<Item = Condition>) -> Condition {
        Self::boolean("and", conditions)
    }

    pub fn or(conditions: impl IntoIterator<Item = Condition>) -> Condition {
        Self::boolean("or", conditions)
    }

    fn boolean(operator: &str, conditions: impl IntoIterator<Item = Condition>) -> Condition {
        Condition::new("booleanCondition")
            .with_parameter("operator", operator)
            .with_parameter("subConditions", conditions.into_iter().collect::<Vec<_>>())
    }

    pub fn not(condition: Condition) -> Condition {
        Condition::new("notCondition").with_parameter("subCondition", condition)
    }

    /// Scope `condition` to each element of the object list at `path`
    pub fn nested(path: impl Into<String>, condition: Condition) -> Condition {
        Condition::new("nestedCondition")
            .with_parameter("path", path.into())
            .with_parameter("subCondition", condition)
    }

    /// Identifier set; `matching = false` means "none of these ids"
    pub fn ids<I, S>(ids: I, matching: bool) -> Condition
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ids: Vec<Value> = ids.into_iter().map(|id| Value::String(id.into())).collect();
        Condition::new("idsCondition")
            .with_parameter("ids", ids)
            .with_parameter("match", matching)
    }

    pub fn match_all() -> Condition {
        Condition::new("matchAllCondition")
    }

    pub fn event_type(event_type: impl Into<String>) -> Condition {
        Condition::new("eventTypeCondition").with_parameter("eventTypeId", event_type.into())
    }

    pub fn profile_property(name: impl Into<String>) -> PropertyConditionBuilder {
        PropertyConditionBuilder::new("profilePropertyCondition", name)
    }

    pub fn session_property(name: impl Into<String>) -> PropertyConditionBuilder {
        PropertyConditionBuilder::new("sessionPropertyCondition", name)
    }

    pub fn event_property(name: impl Into<String>) -> PropertyConditionBuilder {
        PropertyConditionBuilder::new("eventPropertyCondition", name)
    }

    /// Past-event condition with the default `eventsOccurred` operator.
    /// Counts, day windows and dates are added with `with_parameter`.
    pub fn past_event(event_condition: Condition) -> Condition {
        Condition::new("pastEventCondition")
            .with_parameter("eventCondition", event_condition)
            .with_parameter("operator", "eventsOccurred")
    }

    /// Source-event-property filter; absent filters are left unset
    pub fn source_event_property(
        id: Option<&str>,
        path: Option<&str>,
        source_type: Option<&str>,
        scope: Option<&str>,
    ) -> Condition {
        let mut condition = Condition::new("sourceEventPropertyCondition");
        for (name, value) in [("id", id), ("path", path), ("type", source_type), ("scope", scope)] {
            if let Some(value) = value {
                condition.set_parameter(name, value);
            }
        }
        condition
    }

    /// `distance` carries its unit suffix, e.g. `"10km"`
    pub fn geo_circle(latitude: f64, longitude: f64, distance: impl Into<String>) -> Condition {
        Condition::new("geoLocationByPointSessionCondition")
            .with_parameter("type", "circle")
            .with_parameter("circleLatitude", latitude)
            .with_parameter("circleLongitude", longitude)
            .with_parameter("distance", distance.into())
    }

    pub fn geo_rectangle(
        latitude_ne: f64,
        longitude_ne: f64,
        latitude_sw: f64,
        longitude_sw: f64,
    ) -> Condition {
        Condition::new("geoLocationByPointSessionCondition")
            .with_parameter("type", "rectangle")
            .with_parameter("rectangleLatitudeNE", latitude_ne)
            .with_parameter("rectangleLongitudeNE", longitude_ne)
            .with_parameter("rectangleLatitudeSW", latitude_sw)
            .with_parameter("rectangleLongitudeSW", longitude_sw)
    }
}

/// Second stage of a property condition: pick the operator and operand
#[derive(Debug, Clone)]
pub struct PropertyConditionBuilder {
    condition_type_id: &'static str,
    property_name: String,
    dates: bool,
}

impl PropertyConditionBuilder {
    fn new(condition_type_id: &'static str, property_name: impl Into<String>) -> Self {
        Self {
            condition_type_id,
            property_name: property_name.into(),
            dates: false,
        }
    }

    /// Route operands into the date parameters (`propertyValueDate`, ...)
    pub fn as_date(mut self) -> Self {
        self.dates = true;
        self
    }

    fn base(&self, operator: &str) -> Condition {
        Condition::new(self.condition_type_id)
            .with_parameter("propertyName", self.property_name.clone())
            .with_parameter("comparisonOperator", operator)
    }

    /// Parameter a single operand is stored under, chosen by its shape
    fn single_slot(&self, value: &Value) -> &'static str {
        match value {
            _ if self.dates => "propertyValueDate",
            Value::Number(n) if n.fract() == 0.0 => "propertyValueInteger",
            Value::Number(_) => "propertyValueDouble",
            _ => "propertyValue",
        }
    }

    fn multi_slot(&self, values: &[Value]) -> &'static str {
        if self.dates {
            return "propertyValuesDate";
        }
        let numbers: Vec<f64> = values
            .iter()
            .filter_map(|v| match v {
                Value::Number(n) => Some(*n),
                _ => None,
            })
            .collect();
        if numbers.is_empty() || numbers.len() != values.len() {
            "propertyValues"
        } else if numbers.iter().all(|n| n.fract() == 0.0) {
            "propertyValuesInteger"
        } else {
            "propertyValuesDouble"
        }
    }

    /// Any single-operand operator by name
    pub fn operator(self, operator: &str, value: impl Into<Value>) -> Condition {
        let value = value.into();
        let slot = self.single_slot(&value);
        self.base(operator).with_parameter(slot, value)
    }

    /// Any list-operand operator by name
    pub fn operator_values<I, V>(self, operator: &str, values: I) -> Condition
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        let slot = self.multi_slot(&values);
        self.base(operator).with_parameter(slot, values)
    }

    pub fn equals(self, value: impl Into<Value>) -> Condition {
        self.operator("equals", value)
    }

    pub fn not_equals(self, value: impl Into<Value>) -> Condition {
        self.operator("notEquals", value)
    }

    pub fn greater_than(self, value: impl Into<Value>) -> Condition {
        self.operator("greaterThan", value)
    }

    pub fn greater_than_or_equal_to(self, value: impl Into<Value>) -> Condition {
        self.operator("greaterThanOrEqualTo", value)
    }

    pub fn less_than(self, value: impl Into<Value>) -> Condition {
        self.operator("lessThan", value)
    }

    pub fn less_than_or_equal_to(self, value: impl Into<Value>) -> Condition {
        self.operator("lessThanOrEqualTo", value)
    }

    pub fn between(self, low: impl Into<Value>, high: impl Into<Value>) -> Condition {
        self.operator_values("between", [low.into(), high.into()])
    }

    pub fn exists(self) -> Condition {
        self.base("exists")
    }

    pub fn missing(self) -> Condition {
        self.base("missing")
    }

    pub fn contains(self, value: impl Into<Value>) -> Condition {
        self.operator("contains", value)
    }

    pub fn not_contains(self, value: impl Into<Value>) -> Condition {
        self.operator("notContains", value)
    }

    pub fn starts_with(self, value: impl Into<Value>) -> Condition {
        self.operator("startsWith", value)
    }

    pub fn ends_with(self, value: impl Into<Value>) -> Condition {
        self.operator("endsWith", value)
    }

    pub fn matches_regex(self, pattern: impl Into<Value>) -> Condition {
        self.operator("matchesRegex", pattern)
    }

    pub fn is_in<I, V>(self, values: I) -> Condition
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.operator_values("in", values)
    }

    pub fn not_in<I, V>(self, values: I) -> Condition
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.operator_values("notIn", values)
    }

    pub fn all<I, V>(self, values: I) -> Condition
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.operator_values("all", values)
    }

    pub fn has_some_of<I, V>(self, values: I) -> Condition
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.operator_values("hasSomeOf", values)
    }

    pub fn has_none_of<I, V>(self, values: I) -> Condition
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.operator_values("hasNoneOf", values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_builder_picks_value_slot() {
        let c = ConditionBuilder::profile_property("properties.age").greater_than(18);
        assert_eq!(c.i64_parameter("propertyValueInteger"), Some(18));
        assert!(!c.has_parameter("propertyValue"));

        let c = ConditionBuilder::profile_property("properties.score").less_than(0.5);
        assert_eq!(c.f64_parameter("propertyValueDouble"), Some(0.5));

        let c = ConditionBuilder::event_property("properties.lastVisit")
            .as_date()
            .greater_than("2024-01-01T00:00:00Z");
        assert_eq!(c.string_parameter("propertyValueDate"), Some("2024-01-01T00:00:00Z"));
    }

    #[test]
    fn test_property_builder_list_slot() {
        let c = ConditionBuilder::profile_property("properties.tags").has_some_of(["a", "b"]);
        assert!(c.has_parameter("propertyValues"));

        let c = ConditionBuilder::profile_property("properties.age").between(18, 65);
        assert!(c.has_parameter("propertyValuesInteger"));
    }

    #[test]
    fn test_source_event_property_only_sets_given_filters() {
        let c = ConditionBuilder::source_event_property(Some("site"), None, None, Some("web"));
        assert_eq!(c.parameter_values.len(), 2);
        assert_eq!(c.string_parameter("id"), Some("site"));
        assert_eq!(c.string_parameter("scope"), Some("web"));
    }

    #[test]
    fn test_composites() {
        let c = ConditionBuilder::not(ConditionBuilder::ids(["p1"], true));
        let inner = c.condition_parameter("subCondition").unwrap();
        assert_eq!(inner.condition_type_id, "idsCondition");
        assert_eq!(inner.bool_parameter("match"), Some(true));

        let empty = ConditionBuilder::or(Vec::new());
        assert_eq!(empty.conditions_parameter("subConditions").unwrap().len(), 0);
    }
}
