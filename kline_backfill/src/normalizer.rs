//! Raw positional records to named candles and sink documents.

use chrono::DateTime;
use serde_json::Value;
use thiserror::Error;

use crate::models::{
    document::Document,
    kline::{KLINE_ARITY, Kline, RawKline},
};

const FIELDS: [&str; KLINE_ARITY] = [
    "open_time",
    "open",
    "high",
    "low",
    "close",
    "volume",
    "close_time",
    "quote_volume",
    "trade_count",
    "taker_buy_base",
    "taker_buy_quote",
];

/// Why a raw record could not be normalized. The record is dropped.
#[derive(Debug, Error, PartialEq)]
pub enum NormalizeError {
    #[error("record is not a positional array: {0}")]
    NotAnArray(String),

    #[error("record has {found} fields, expected at least {}", KLINE_ARITY)]
    Arity { found: usize },

    #[error("field `{field}` is not a valid number: {value}")]
    Field { field: &'static str, value: String },

    #[error("open time {0} is out of range")]
    Timestamp(i64),
}

/// A decoded candle with its derived value and canonical timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedKline {
    pub kline: Kline,
    /// Arithmetic mean of open and close.
    pub value: f64,
    /// Open time truncated to seconds, `YYYY-MM-DDTHH:MM:SS` UTC.
    pub timestamp: String,
}

impl NormalizedKline {
    pub fn to_document(&self, symbol: &str) -> Document {
        Document::new(symbol, self.timestamp.clone(), self.value)
    }
}

/// Decode and derive in one step.
pub fn normalize(raw: &RawKline) -> Result<NormalizedKline, NormalizeError> {
    let kline = decode_kline(raw)?;
    let timestamp = canonical_timestamp(kline.open_time)?;
    Ok(NormalizedKline {
        value: kline.mid_price(),
        timestamp,
        kline,
    })
}

/// Decode a positional record (`[open_time, open, high, low, close, volume,
/// close_time, quote_volume, trade_count, taker_buy_base, taker_buy_quote,
/// ignore]`). Decimal fields may be strings or JSON numbers.
pub fn decode_kline(raw: &RawKline) -> Result<Kline, NormalizeError> {
    let fields = raw
        .as_array()
        .ok_or_else(|| NormalizeError::NotAnArray(raw.to_string()))?;
    if fields.len() < KLINE_ARITY {
        return Err(NormalizeError::Arity { found: fields.len() });
    }

    Ok(Kline {
        open_time: int_field(fields, 0)?,
        open: decimal_field(fields, 1)?,
        high: decimal_field(fields, 2)?,
        low: decimal_field(fields, 3)?,
        close: decimal_field(fields, 4)?,
        volume: decimal_field(fields, 5)?,
        close_time: int_field(fields, 6)?,
        quote_volume: decimal_field(fields, 7)?,
        trade_count: count_field(fields, 8)?,
        taker_buy_base: decimal_field(fields, 9)?,
        taker_buy_quote: decimal_field(fields, 10)?,
    })
}

/// Truncate milliseconds to whole seconds and format as UTC
/// `YYYY-MM-DDTHH:MM:SS`.
pub fn canonical_timestamp(open_time_ms: i64) -> Result<String, NormalizeError> {
    DateTime::from_timestamp(open_time_ms.div_euclid(1000), 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%S").to_string())
        .ok_or(NormalizeError::Timestamp(open_time_ms))
}

fn field_error(fields: &[Value], idx: usize) -> NormalizeError {
    NormalizeError::Field {
        field: FIELDS[idx],
        value: fields[idx].to_string(),
    }
}

fn decimal_field(fields: &[Value], idx: usize) -> Result<f64, NormalizeError> {
    let parsed = match &fields[idx] {
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    };
    parsed
        .filter(|v| v.is_finite())
        .ok_or_else(|| field_error(fields, idx))
}

fn int_field(fields: &[Value], idx: usize) -> Result<i64, NormalizeError> {
    fields[idx].as_i64().ok_or_else(|| field_error(fields, idx))
}

fn count_field(fields: &[Value], idx: usize) -> Result<u64, NormalizeError> {
    fields[idx].as_u64().ok_or_else(|| field_error(fields, idx))
}
