//! Date parsing for date-typed parameters and properties
//!
//! Dates travel as strings. Accepted forms:
//! - RFC 3339 (`2024-03-01T10:00:00Z`, `2024-03-01T10:00:00.250+02:00`)
//! - naive date-time, read as UTC (`2024-03-01T10:00:00`)
//! - plain date, midnight UTC (`2024-03-01`)
//! - date math anchored on `now` or on a date followed by `||`:
//!   `now-30d`, `now-1M/d`, `2024-03-01||+1y`
//!
//! Date math is a sequence of `+N<unit>`, `-N<unit>` and `/<unit>` steps,
//! applied left to right. `N` defaults to 1. Units are `y M w d h H m s`.
//! Rounding truncates down to the start of the unit; weeks start on Monday.
//!
//! Numbers are epoch milliseconds.

use crate::types::Value;
use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, NaiveDateTime, Timelike, Utc};

/// Parse a date string relative to the current instant
pub fn parse_date(input: &str) -> Option<DateTime<Utc>> {
    parse_date_at(input, Utc::now())
}

/// Parse a date string, resolving `now` against the given instant
pub fn parse_date_at(input: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let input = input.trim();
    if let Some(math) = input.strip_prefix("now") {
        return apply_math(now, math);
    }
    match input.split_once("||") {
        Some((anchor, math)) => apply_math(parse_plain(anchor)?, math),
        None => parse_plain(input),
    }
}

/// Parse an absolute date only; expressions relative to `now` are rejected
pub fn parse_absolute_date(input: &str) -> Option<DateTime<Utc>> {
    if input.trim_start().starts_with("now") {
        return None;
    }
    parse_date(input)
}

/// Date view of a value: strings are parsed, numbers are epoch millis
pub fn value_to_date(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => parse_date(s),
        Value::Number(n) if n.is_finite() => DateTime::from_timestamp_millis(*n as i64),
        _ => None,
    }
}

fn parse_plain(input: &str) -> Option<DateTime<Utc>> {
    let input = input.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(input, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn apply_math(mut time: DateTime<Utc>, math: &str) -> Option<DateTime<Utc>> {
    let bytes = math.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let (round, sign) = match bytes[i] {
            b'/' => (true, 1),
            b'+' => (false, 1),
            b'-' => (false, -1),
            _ => return None,
        };
        i += 1;

        let digits = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        let amount: i64 = if i == digits { 1 } else { math[digits..i].parse().ok()? };
        if round && amount != 1 {
            return None;
        }

        let unit = char::from(*bytes.get(i)?);
        i += 1;
        time = if round {
            round_down(time, unit)?
        } else {
            shift(time, unit, sign * amount)?
        };
    }
    Some(time)
}

fn shift(time: DateTime<Utc>, unit: char, amount: i64) -> Option<DateTime<Utc>> {
    let delta = match unit {
        'y' => return shift_months(time, amount.checked_mul(12)?),
        'M' => return shift_months(time, amount),
        'w' => Duration::try_weeks(amount)?,
        'd' => Duration::try_days(amount)?,
        'h' | 'H' => Duration::try_hours(amount)?,
        'm' => Duration::try_minutes(amount)?,
        's' => Duration::try_seconds(amount)?,
        _ => return None,
    };
    time.checked_add_signed(delta)
}

/// Calendar month arithmetic; the day is clamped to the end of a shorter month
fn shift_months(time: DateTime<Utc>, months: i64) -> Option<DateTime<Utc>> {
    let step = Months::new(u32::try_from(months.unsigned_abs()).ok()?);
    if months >= 0 {
        time.checked_add_months(step)
    } else {
        time.checked_sub_months(step)
    }
}

fn round_down(time: DateTime<Utc>, unit: char) -> Option<DateTime<Utc>> {
    let date = time.date_naive();
    let rounded = match unit {
        'y' => date.with_ordinal(1)?.and_hms_opt(0, 0, 0)?,
        'M' => date.with_day(1)?.and_hms_opt(0, 0, 0)?,
        'w' => {
            let since_monday = i64::from(date.weekday().num_days_from_monday());
            date.checked_sub_signed(Duration::try_days(since_monday)?)?
                .and_hms_opt(0, 0, 0)?
        }
        'd' => date.and_hms_opt(0, 0, 0)?,
        'h' | 'H' => date.and_hms_opt(time.hour(), 0, 0)?,
        'm' => date.and_hms_opt(time.hour(), time.minute(), 0)?,
        's' => date.and_hms_opt(time.hour(), time.minute(), time.second())?,
        _ => return None,
    };
    Some(rounded.and_utc())
}
