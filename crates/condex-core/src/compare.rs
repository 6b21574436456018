//! Typed value comparison
//!
//! The expected operand decides how a comparison is carried out: numbers
//! compare numerically, booleans as booleans, and strings as dates when
//! both sides read as dates, otherwise as text. The property evaluator and
//! the in-memory backend both go through here so that direct evaluation and
//! compiled queries agree.

use crate::date::{parse_absolute_date, parse_date};
use crate::types::Value;
use chrono::DateTime;
use dashmap::DashMap;
use regex::Regex;
use std::cmp::Ordering;
use std::sync::LazyLock;

/// Compiled patterns, keyed by their source text
static REGEX_CACHE: LazyLock<DashMap<String, Regex>> = LazyLock::new(DashMap::new);

/// Order `actual` relative to `expected`; `None` when they are not comparable
pub fn compare_values(actual: &Value, expected: &Value) -> Option<Ordering> {
    match (actual, expected) {
        (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (_, Value::Number(b)) => actual_number(actual)?.partial_cmp(b),
        (_, Value::Bool(b)) => Some(actual.as_bool()?.cmp(b)),
        (_, Value::String(text)) => compare_with_text(actual, text),
        _ => (actual == expected).then_some(Ordering::Equal),
    }
}

/// Typed equality
pub fn values_equal(actual: &Value, expected: &Value) -> bool {
    compare_values(actual, expected) == Some(Ordering::Equal)
}

/// Text view of a scalar; containers have none
pub fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(_) | Value::Bool(_) => Some(value.to_string()),
        _ => None,
    }
}

/// Whole-value regular expression match, as search engines apply it
pub fn regex_matches(pattern: &str, text: &str) -> Result<bool, regex::Error> {
    if let Some(re) = REGEX_CACHE.get(pattern) {
        return Ok(re.is_match(text));
    }
    let re = Regex::new(&format!("^(?:{})$", pattern))?;
    let matched = re.is_match(text);
    REGEX_CACHE.insert(pattern.to_string(), re);
    Ok(matched)
}

fn actual_number(actual: &Value) -> Option<f64> {
    match actual {
        Value::Number(n) => Some(*n),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn compare_with_text(actual: &Value, text: &str) -> Option<Ordering> {
    match actual {
        Value::String(s) => {
            if s == text {
                return Some(Ordering::Equal);
            }
            if let (Some(a), Some(b)) = (parse_absolute_date(s), parse_date(text)) {
                return Some(a.cmp(&b));
            }
            Some(s.as_str().cmp(text))
        }
        Value::Number(n) => {
            if let Ok(t) = text.trim().parse::<f64>() {
                return n.partial_cmp(&t);
            }
            let expected = parse_date(text)?;
            Some(DateTime::from_timestamp_millis(*n as i64)?.cmp(&expected))
        }
        Value::Bool(b) => text.parse::<bool>().ok().map(|t| b.cmp(&t)),
        _ => None,
    }
}
