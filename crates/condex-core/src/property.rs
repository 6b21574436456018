//! Property conditions
//!
//! `profilePropertyCondition`, `sessionPropertyCondition` and
//! `eventPropertyCondition` share one parameter layout: a `propertyName`
//! path, a `comparisonOperator`, and an operand stored in one of several
//! typed slots. This module reads that layout once for both execution paths.

use crate::compare::{compare_values, regex_matches, text_of, values_equal};
use crate::condition::Condition;
use crate::date::value_to_date;
use crate::error::{CoreError, Result};
use crate::types::Value;
use std::cmp::Ordering;
use std::fmt;

/// Single-operand slots, in lookup order
const SINGLE_SLOTS: [&str; 5] = [
    "propertyValue",
    "propertyValueInteger",
    "propertyValueDouble",
    "propertyValueDate",
    "propertyValueDateExpr",
];

/// List-operand slots, in lookup order
const LIST_SLOTS: [&str; 5] = [
    "propertyValues",
    "propertyValuesInteger",
    "propertyValuesDouble",
    "propertyValuesDate",
    "propertyValuesDateExpr",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonOperator {
    Equals,
    NotEquals,
    GreaterThan,
    GreaterThanOrEqualTo,
    LessThan,
    LessThanOrEqualTo,
    Between,
    Exists,
    Missing,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    MatchesRegex,
    In,
    NotIn,
    All,
    HasSomeOf,
    HasNoneOf,
}

impl ComparisonOperator {
    /// Parse an operator name; the symbolic forms are accepted as aliases
    pub fn parse(name: &str) -> Option<Self> {
        let op = match name {
            "equals" | "=" => Self::Equals,
            "notEquals" | "!=" => Self::NotEquals,
            "greaterThan" | ">" => Self::GreaterThan,
            "greaterThanOrEqualTo" | ">=" => Self::GreaterThanOrEqualTo,
            "lessThan" | "<" => Self::LessThan,
            "lessThanOrEqualTo" | "<=" => Self::LessThanOrEqualTo,
            "between" => Self::Between,
            "exists" => Self::Exists,
            "missing" => Self::Missing,
            "contains" => Self::Contains,
            "notContains" => Self::NotContains,
            "startsWith" => Self::StartsWith,
            "endsWith" => Self::EndsWith,
            "matchesRegex" => Self::MatchesRegex,
            "in" => Self::In,
            "notIn" => Self::NotIn,
            "all" => Self::All,
            "hasSomeOf" => Self::HasSomeOf,
            "hasNoneOf" => Self::HasNoneOf,
            _ => return None,
        };
        Some(op)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Equals => "equals",
            Self::NotEquals => "notEquals",
            Self::GreaterThan => "greaterThan",
            Self::GreaterThanOrEqualTo => "greaterThanOrEqualTo",
            Self::LessThan => "lessThan",
            Self::LessThanOrEqualTo => "lessThanOrEqualTo",
            Self::Between => "between",
            Self::Exists => "exists",
            Self::Missing => "missing",
            Self::Contains => "contains",
            Self::NotContains => "notContains",
            Self::StartsWith => "startsWith",
            Self::EndsWith => "endsWith",
            Self::MatchesRegex => "matchesRegex",
            Self::In => "in",
            Self::NotIn => "notIn",
            Self::All => "all",
            Self::HasSomeOf => "hasSomeOf",
            Self::HasNoneOf => "hasNoneOf",
        }
    }

    /// Operators whose operand is a list
    pub fn takes_list(&self) -> bool {
        matches!(
            self,
            Self::Between | Self::In | Self::NotIn | Self::All | Self::HasSomeOf | Self::HasNoneOf
        )
    }

    /// Operators with no operand at all
    pub fn takes_none(&self) -> bool {
        matches!(self, Self::Exists | Self::Missing)
    }

    /// Operators that hold when no value of the property matches. The
    /// property must still exist.
    pub fn is_negative(&self) -> bool {
        matches!(
            self,
            Self::NotEquals | Self::NotContains | Self::NotIn | Self::HasNoneOf
        )
    }

    /// Positive counterpart of a negative operator
    pub fn positive(&self) -> Self {
        match self {
            Self::NotEquals => Self::Equals,
            Self::NotContains => Self::Contains,
            Self::NotIn => Self::In,
            Self::HasNoneOf => Self::HasSomeOf,
            other => *other,
        }
    }
}

impl fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The operand of a property condition
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    None,
    Single(Value),
    List(Vec<Value>),
}

/// A parsed property condition
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyCondition<'a> {
    pub property_name: &'a str,
    pub operator: ComparisonOperator,
    pub operand: Operand,
}

impl<'a> PropertyCondition<'a> {
    pub fn from_condition(condition: &'a Condition) -> Result<Self> {
        let invalid = |parameter: &str, message: String| {
            CoreError::invalid_parameter(&condition.condition_type_id, parameter, message)
        };

        let property_name = condition
            .string_parameter("propertyName")
            .ok_or_else(|| invalid("propertyName", "a property path is required".to_string()))?;
        let operator_name = condition.string_parameter("comparisonOperator").ok_or_else(|| {
            invalid("comparisonOperator", "an operator is required".to_string())
        })?;
        let operator = ComparisonOperator::parse(operator_name).ok_or_else(|| {
            invalid(
                "comparisonOperator",
                format!("unknown operator '{}'", operator_name),
            )
        })?;

        let operand = if operator.takes_none() {
            Operand::None
        } else if operator.takes_list() {
            let (slot, values) = list_operand(condition).ok_or_else(|| {
                invalid(
                    "propertyValues",
                    format!("operator '{}' needs a list of values", operator),
                )
            })?;
            check_dates(slot, &values).map_err(|message| invalid(slot, message))?;
            if operator == ComparisonOperator::Between && values.len() != 2 {
                return Err(invalid(
                    "propertyValues",
                    format!("'between' needs exactly two bounds, got {}", values.len()),
                ));
            }
            Operand::List(values)
        } else {
            let (slot, value) = single_operand(condition).ok_or_else(|| {
                invalid(
                    "propertyValue",
                    format!("operator '{}' needs a value", operator),
                )
            })?;
            check_dates(slot, std::slice::from_ref(&value))
                .map_err(|message| invalid(slot, message))?;
            if operator == ComparisonOperator::MatchesRegex {
                let pattern = text_of(&value).unwrap_or_default();
                if let Err(e) = regex_matches(&pattern, "") {
                    return Err(invalid("propertyValue", format!("invalid regex: {}", e)));
                }
            }
            Operand::Single(value)
        };

        Ok(Self {
            property_name,
            operator,
            operand,
        })
    }

    /// The single operand, if the operator takes one
    pub fn value(&self) -> Option<&Value> {
        match &self.operand {
            Operand::Single(v) => Some(v),
            _ => None,
        }
    }

    /// The list operand, if the operator takes one
    pub fn values(&self) -> &[Value] {
        match &self.operand {
            Operand::List(values) => values,
            _ => &[],
        }
    }

    /// Test the collected values of the property.
    ///
    /// `actual` is the flattened multi-value view of the path; an empty
    /// slice means the property is missing.
    pub fn matches(&self, actual: &[Value]) -> bool {
        match self.operator {
            ComparisonOperator::Missing => return actual.is_empty(),
            ComparisonOperator::Exists => return !actual.is_empty(),
            _ if actual.is_empty() => return false,
            _ => {}
        }
        if self.operator.is_negative() {
            let positive = self.operator.positive();
            return !actual.iter().any(|v| self.matches_one(positive, v));
        }
        if self.operator == ComparisonOperator::All {
            return self
                .values()
                .iter()
                .all(|expected| actual.iter().any(|v| values_equal(v, expected)));
        }
        actual.iter().any(|v| self.matches_one(self.operator, v))
    }

    fn matches_one(&self, operator: ComparisonOperator, actual: &Value) -> bool {
        use ComparisonOperator::*;

        let ordering = |expected: &Value| compare_values(actual, expected);
        match operator {
            Equals => self.value().is_some_and(|e| values_equal(actual, e)),
            GreaterThan => self.value().and_then(ordering) == Some(Ordering::Greater),
            GreaterThanOrEqualTo => matches!(
                self.value().and_then(ordering),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            LessThan => self.value().and_then(ordering) == Some(Ordering::Less),
            LessThanOrEqualTo => matches!(
                self.value().and_then(ordering),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Between => match self.values() {
                [low, high] => {
                    matches!(ordering(low), Some(Ordering::Greater | Ordering::Equal))
                        && matches!(ordering(high), Some(Ordering::Less | Ordering::Equal))
                }
                _ => false,
            },
            Contains => self.text_test(actual, |a, e| a.contains(e)),
            StartsWith => self.text_test(actual, |a, e| a.starts_with(e)),
            EndsWith => self.text_test(actual, |a, e| a.ends_with(e)),
            MatchesRegex => self.text_test(actual, |a, e| regex_matches(e, a).unwrap_or(false)),
            In | HasSomeOf => self.values().iter().any(|e| values_equal(actual, e)),
            // handled in `matches`
            NotEquals | NotContains | NotIn | HasNoneOf | All | Exists | Missing => false,
        }
    }

    fn text_test(&self, actual: &Value, test: impl Fn(&str, &str) -> bool) -> bool {
        match (text_of(actual), self.value().and_then(text_of)) {
            (Some(a), Some(e)) => test(&a, &e),
            _ => false,
        }
    }
}

fn single_operand(condition: &Condition) -> Option<(&'static str, Value)> {
    SINGLE_SLOTS.iter().find_map(|&slot| {
        let value = condition.parameter(slot)?;
        Some(if is_date_slot(slot) {
            (slot, normalize_date(value))
        } else {
            (slot, value.clone())
        })
    })
}

fn list_operand(condition: &Condition) -> Option<(&'static str, Vec<Value>)> {
    LIST_SLOTS.iter().find_map(|&slot| {
        let value = condition.parameter(slot)?;
        let dates = is_date_slot(slot);
        let items = match value {
            Value::Array(items) => items.clone(),
            single => vec![single.clone()],
        };
        let values = items
            .iter()
            .filter(|v| !v.is_null())
            .map(|v| if dates { normalize_date(v) } else { v.clone() })
            .collect();
        Some((slot, values))
    })
}

fn is_date_slot(slot: &str) -> bool {
    slot.starts_with("propertyValueDate") || slot.starts_with("propertyValuesDate")
}

/// Operands of a date slot must read as dates, so they never fall back to
/// text comparison
fn check_dates(slot: &str, values: &[Value]) -> std::result::Result<(), String> {
    if !is_date_slot(slot) {
        return Ok(());
    }
    match values.iter().find(|v| value_to_date(v).is_none()) {
        Some(bad) => Err(format!("'{}' is not a date or date expression", bad)),
        None => Ok(()),
    }
}

/// Date operands travel as strings; epoch-millis numbers become RFC 3339
fn normalize_date(value: &Value) -> Value {
    match value {
        Value::Number(_) => value_to_date(value)
            .map(|d| Value::String(d.to_rfc3339()))
            .unwrap_or_else(|| value.clone()),
        other => other.clone(),
    }
}
