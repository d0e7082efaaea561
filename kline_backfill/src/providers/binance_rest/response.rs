use serde::Deserialize;

/// Error body the exchange sends with non-2xx responses,
/// e.g. `{"code":-1121,"msg":"Invalid symbol."}`.
#[derive(Deserialize, Debug)]
pub struct BinanceErrorBody {
    pub code: i64,
    pub msg: String,
}

impl BinanceErrorBody {
    /// Best-effort parse; `None` for bodies that aren't the exchange's error JSON.
    pub fn parse(body: &str) -> Option<Self> {
        serde_json::from_str(body).ok()
    }
}
