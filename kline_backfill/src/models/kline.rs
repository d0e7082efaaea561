//! Exchange candles.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One positional record as returned by the source API, kept untyped until
/// normalization so a malformed record can't poison its page.
pub type RawKline = Value;

/// Records returned by a single page request, ordered by open time.
pub type RawPage = Vec<RawKline>;

/// Number of leading positions a record must have to decode (the trailing
/// "ignore" field is optional).
pub const KLINE_ARITY: usize = 11;

/// A decoded OHLCV candle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Kline {
    /// Candle open time, epoch milliseconds (UTC).
    pub open_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    /// Base asset volume.
    pub volume: f64,
    /// Candle close time, epoch milliseconds (UTC).
    pub close_time: i64,
    pub quote_volume: f64,
    pub trade_count: u64,
    pub taker_buy_base: f64,
    pub taker_buy_quote: f64,
}

impl Kline {
    /// Midpoint of open and close.
    pub fn mid_price(&self) -> f64 {
        (self.open + self.close) / 2.0
    }
}

/// Open time of a raw record, if it has one.
///
/// The backfill engine only needs this field to move its cursor, so it reads
/// it without decoding the rest of the record.
pub fn raw_open_time(record: &RawKline) -> Option<i64> {
    record.get(0).and_then(Value::as_i64)
}
