//! Human-readable date expressions to UTC instants.
//!
//! Accepted forms (case-insensitive, a trailing `UTC` token is ignored):
//! - `now`, `today`, `yesterday`
//! - relative offsets: `24 hours ago`, `3 days ago`, `an hour ago`, and the
//!   calendar forms `2 months ago`, `a year ago`
//! - RFC-3339 with an offset: `2018-02-12T10:00:00+01:00`
//! - naive dates and datetimes: `2018-02-12`, `2018-02-12 10:00`,
//!   `2018-02-12T10:00:00`, `January 01, 2018`, `Jan 1, 2018`, `1 January 2018`
//! - a naive form followed by an IANA zone: `2018-03-25 01:30 Europe/Amsterdam`
//!
//! Naive values without a zone are UTC. Zoned local times resolve strictly:
//! a wall time skipped by a DST gap or repeated by a fall-back is an error.

use chrono::{DateTime, LocalResult, Months, NaiveDate, NaiveDateTime, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DateExprError {
    #[error("empty date expression")]
    Empty,

    #[error("unrecognized date expression: {0:?}")]
    Unrecognized(String),

    #[error("date expression out of range: {0:?}")]
    OutOfRange(String),

    #[error("ambiguous local time {expr:?} in {tz}")]
    Ambiguous { expr: String, tz: String },

    #[error("nonexistent local time {expr:?} in {tz}")]
    Nonexistent { expr: String, tz: String },
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%B %d, %Y", "%b %d, %Y", "%d %B %Y", "%d %b %Y"];

/// Parse `expr` into a UTC instant, resolving relative forms against `now`.
pub fn parse_date_expr(expr: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, DateExprError> {
    let body = strip_utc_suffix(expr.trim());
    if body.is_empty() {
        return Err(DateExprError::Empty);
    }

    match body.to_ascii_lowercase().as_str() {
        "now" | "today" => return Ok(now),
        "yesterday" => return sub(now, TimeDelta::days(1), expr),
        _ => {}
    }

    if let Some(offset) = parse_relative(body, expr)? {
        return go_back(now, offset, expr);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(body) {
        return Ok(dt.with_timezone(&Utc));
    }

    if let Some(naive) = parse_naive(body) {
        return Ok(naive.and_utc());
    }

    if let Some((naive_part, zone)) = body.rsplit_once(char::is_whitespace) {
        if let (Some(naive), Ok(tz)) = (parse_naive(naive_part.trim_end()), zone.parse::<Tz>()) {
            return from_local_strict(naive, tz, expr);
        }
    }

    Err(DateExprError::Unrecognized(expr.to_string()))
}

/// Same as [`parse_date_expr`] but returns epoch milliseconds.
pub fn date_to_millis(expr: &str, now: DateTime<Utc>) -> Result<i64, DateExprError> {
    parse_date_expr(expr, now).map(|dt| dt.timestamp_millis())
}

fn strip_utc_suffix(s: &str) -> &str {
    match s.rsplit_once(char::is_whitespace) {
        Some((head, tail)) if tail.eq_ignore_ascii_case("utc") => head.trim_end(),
        _ if s.eq_ignore_ascii_case("utc") => "",
        _ => s,
    }
}

fn sub(now: DateTime<Utc>, delta: TimeDelta, expr: &str) -> Result<DateTime<Utc>, DateExprError> {
    now.checked_sub_signed(delta)
        .ok_or_else(|| DateExprError::OutOfRange(expr.to_string()))
}

/// How far back a relative expression reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Offset {
    Exact(TimeDelta),
    /// Calendar months, clamped to the end of shorter months.
    Months(u32),
}

fn go_back(now: DateTime<Utc>, offset: Offset, expr: &str) -> Result<DateTime<Utc>, DateExprError> {
    match offset {
        Offset::Exact(delta) => sub(now, delta, expr),
        Offset::Months(months) => now
            .checked_sub_months(Months::new(months))
            .ok_or_else(|| DateExprError::OutOfRange(expr.to_string())),
    }
}

/// `<N> <unit> ago`. Returns `Ok(None)` when the shape doesn't match at all.
fn parse_relative(body: &str, expr: &str) -> Result<Option<Offset>, DateExprError> {
    let tokens: Vec<String> = body.split_whitespace().map(str::to_ascii_lowercase).collect();
    let [amount, unit, ago] = tokens.as_slice() else {
        return Ok(None);
    };
    if ago != "ago" {
        return Ok(None);
    }

    let amount: i64 = match amount.as_str() {
        "a" | "an" => 1,
        digits => digits
            .parse()
            .map_err(|_| DateExprError::Unrecognized(expr.to_string()))?,
    };
    if amount < 0 {
        return Err(DateExprError::Unrecognized(expr.to_string()));
    }
    let out_of_range = || DateExprError::OutOfRange(expr.to_string());

    let unit_secs: i64 = match unit.as_str() {
        "s" | "sec" | "secs" | "second" | "seconds" => 1,
        "min" | "mins" | "minute" | "minutes" => 60,
        "h" | "hr" | "hrs" | "hour" | "hours" => 3_600,
        "d" | "day" | "days" => 86_400,
        "w" | "wk" | "wks" | "week" | "weeks" => 604_800,
        "mo" | "mon" | "month" | "months" | "y" | "yr" | "yrs" | "year" | "years" => {
            let per_unit = if unit.starts_with('m') { 1 } else { 12 };
            let months = amount
                .checked_mul(per_unit)
                .and_then(|m| u32::try_from(m).ok())
                .ok_or_else(out_of_range)?;
            return Ok(Some(Offset::Months(months)));
        }
        _ => return Err(DateExprError::Unrecognized(expr.to_string())),
    };

    amount
        .checked_mul(unit_secs)
        .and_then(TimeDelta::try_seconds)
        .map(|delta| Some(Offset::Exact(delta)))
        .ok_or_else(out_of_range)
}

fn parse_naive(s: &str) -> Option<NaiveDateTime> {
    DATETIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|f| NaiveDate::parse_from_str(s, f).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn from_local_strict(naive: NaiveDateTime, tz: Tz, expr: &str) -> Result<DateTime<Utc>, DateExprError> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Ok(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(_, _) => Err(DateExprError::Ambiguous {
            expr: expr.to_string(),
            tz: tz.name().to_string(),
        }),
        LocalResult::None => Err(DateExprError::Nonexistent {
            expr: expr.to_string(),
            tz: tz.name().to_string(),
        }),
    }
}
