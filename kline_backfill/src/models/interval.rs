//! Candle granularity.
//!
//! An [`Interval`] pairs a non-zero amount with an [`IntervalUnit`] and maps to
//! a fixed millisecond step. Codes follow the exchange's notation (`"1m"`,
//! `"30m"`, `"4h"`, `"1d"`, `"1w"`) and are passed to the source API verbatim.
//!
//! ```
//! use kline_backfill::models::interval::{Interval, IntervalUnit};
//!
//! let iv: Interval = "30m".parse().unwrap();
//! assert_eq!(iv.unit(), IntervalUnit::Minute);
//! assert_eq!(iv.step_ms(), 1_800_000);
//! assert_eq!(iv.to_string(), "30m");
//! ```

use std::{fmt, num::NonZeroU32, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

const MINUTE_MS: i64 = 60 * 1000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IntervalError {
    #[error("unrecognized interval {code:?}: {reason}")]
    Unrecognized { code: String, reason: &'static str },
}

impl IntervalError {
    fn new(code: &str, reason: &'static str) -> Self {
        Self::Unrecognized {
            code: code.to_string(),
            reason,
        }
    }
}

/// Supported interval units. Letters are case-sensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntervalUnit {
    /// `m`
    Minute,
    /// `h`
    Hour,
    /// `d`
    Day,
    /// `w`
    Week,
}

impl IntervalUnit {
    pub const fn millis(self) -> i64 {
        match self {
            IntervalUnit::Minute => MINUTE_MS,
            IntervalUnit::Hour => 60 * MINUTE_MS,
            IntervalUnit::Day => 24 * 60 * MINUTE_MS,
            IntervalUnit::Week => 7 * 24 * 60 * MINUTE_MS,
        }
    }

    pub const fn letter(self) -> char {
        match self {
            IntervalUnit::Minute => 'm',
            IntervalUnit::Hour => 'h',
            IntervalUnit::Day => 'd',
            IntervalUnit::Week => 'w',
        }
    }

    fn from_letter(c: char) -> Option<Self> {
        match c {
            'm' => Some(IntervalUnit::Minute),
            'h' => Some(IntervalUnit::Hour),
            'd' => Some(IntervalUnit::Day),
            'w' => Some(IntervalUnit::Week),
            _ => None,
        }
    }
}

/// An interval = amount × unit (e.g. 30-Minute, 4-Hour, 1-Day).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Interval {
    amount: NonZeroU32,
    unit: IntervalUnit,
}

impl Interval {
    pub const fn new(amount: NonZeroU32, unit: IntervalUnit) -> Self {
        Self { amount, unit }
    }

    pub const fn amount(&self) -> NonZeroU32 {
        self.amount
    }

    pub const fn unit(&self) -> IntervalUnit {
        self.unit
    }

    /// Fixed duration of one candle in milliseconds.
    pub const fn step_ms(&self) -> i64 {
        self.amount.get() as i64 * self.unit.millis()
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.unit.letter())
    }
}

impl FromStr for Interval {
    type Err = IntervalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (idx, last) = s
            .char_indices()
            .last()
            .ok_or_else(|| IntervalError::new(s, "empty code"))?;
        let unit = IntervalUnit::from_letter(last)
            .ok_or_else(|| IntervalError::new(s, "unit must be one of m, h, d, w"))?;

        let digits = &s[..idx];
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(IntervalError::new(s, "amount must be a decimal number"));
        }
        let amount = digits
            .parse::<u32>()
            .map_err(|_| IntervalError::new(s, "amount out of range"))?;
        let amount = NonZeroU32::new(amount).ok_or_else(|| IntervalError::new(s, "amount must be > 0"))?;

        Ok(Interval::new(amount, unit))
    }
}

impl Serialize for Interval {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Interval {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = String::deserialize(deserializer)?;
        code.parse().map_err(serde::de::Error::custom)
    }
}
