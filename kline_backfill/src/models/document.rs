//! Sink-bound documents and their content-derived ids.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Value of the `type` field on every candle document.
pub const DOCUMENT_TYPE: &str = "tokenvalue";

/// Document body as stored in the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenValue {
    /// `[coin, symbol]`
    pub tags: Vec<String>,
    #[serde(rename = "type")]
    pub kind: String,
    pub value: f64,
    /// `YYYY-MM-DDTHH:MM:SS`, UTC.
    pub timestamp: String,
}

/// A document plus the id it is upserted under.
///
/// Serialized in the index's hit shape (`_id`, `_source`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_source")]
    pub body: TokenValue,
}

impl Document {
    pub fn new(symbol: &str, timestamp: String, value: f64) -> Self {
        let coin = coin_tag(symbol);
        let id = document_id(&coin, &timestamp, value);
        Self {
            id,
            body: TokenValue {
                tags: vec![coin, symbol.to_string()],
                kind: DOCUMENT_TYPE.to_string(),
                value,
                timestamp,
            },
        }
    }
}

/// Lowercased first three characters of the symbol (`"ETHBTC"` → `"eth"`).
pub fn coin_tag(symbol: &str) -> String {
    symbol.chars().take(3).collect::<String>().to_lowercase()
}

/// SHA-256 (lowercase hex) over `coin ‖ timestamp ‖ value`.
///
/// `value` uses the shortest round-trip `f64` rendering, which is stable across
/// runs, so replays of the same candle always land on the same id.
pub fn document_id(coin: &str, timestamp: &str, value: f64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{coin}{timestamp}{value}").as_bytes());
    format!("{:x}", hasher.finalize())
}
