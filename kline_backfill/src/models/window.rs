use serde::{Deserialize, Serialize};

/// Absolute backfill range in epoch milliseconds (UTC).
///
/// `end_ms = None` means open-ended: the caller resolves it to the current
/// time at each poll instead of fixing a sentinel up front.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start_ms: i64,
    pub end_ms: Option<i64>,
}

impl TimeWindow {
    pub const fn new(start_ms: i64, end_ms: Option<i64>) -> Self {
        Self { start_ms, end_ms }
    }

    /// The end bound to use right now.
    pub fn effective_end(&self, now_ms: i64) -> i64 {
        self.end_ms.unwrap_or(now_ms)
    }
}
