//! Per-symbol backfill progress.

use serde::{Deserialize, Serialize};

use crate::models::{interval::Interval, window::TimeWindow};

/// Backfill state machine phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackfillState {
    /// Symbol not yet seen at the cursor time.
    Probing,
    /// Symbol confirmed, collecting pages.
    Fetching,
    Done,
}

/// Everything needed to continue a symbol's backfill after a restart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackfillCursor {
    pub symbol: String,
    pub interval: Interval,
    /// The window the run was started with. `window.start_ms` never moves.
    pub window: TimeWindow,
    /// Next page's start time.
    pub start_ms: i64,
    pub symbol_existed: bool,
    pub call_count: u64,
    pub probe_calls: u64,
    /// Open time of the last record handed out, for the monotonic guard.
    pub last_open_time: Option<i64>,
    pub state: BackfillState,
}

impl BackfillCursor {
    pub fn new(symbol: impl Into<String>, interval: Interval, window: TimeWindow) -> Self {
        Self {
            symbol: symbol.into(),
            interval,
            window,
            start_ms: window.start_ms,
            symbol_existed: false,
            call_count: 0,
            probe_calls: 0,
            last_open_time: None,
            state: BackfillState::Probing,
        }
    }

    pub fn is_done(&self) -> bool {
        self.state == BackfillState::Done
    }

    /// Whether this stored cursor can continue a request for `window`.
    ///
    /// Everything in `[self.window.start_ms, self.start_ms)` has already been
    /// sunk, so a request starting at or after the stored start loses nothing
    /// by skipping ahead. An earlier start would leave a hole.
    pub fn can_resume(&self, interval: Interval, window: &TimeWindow) -> bool {
        !self.is_done() && self.interval == interval && window.start_ms >= self.window.start_ms
    }

    /// Re-target a stored cursor at a new request window.
    pub fn resume_into(mut self, window: TimeWindow) -> Self {
        if window.start_ms > self.start_ms {
            // nothing between the old position and the new start gets sunk
            self.start_ms = window.start_ms;
            self.window.start_ms = window.start_ms;
        }
        self.window.end_ms = window.end_ms;
        self.call_count = 0;
        self
    }
}
