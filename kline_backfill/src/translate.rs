//! Interval codes and date expressions to absolute millisecond bounds.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::{
    models::{
        interval::{Interval, IntervalError},
        window::TimeWindow,
    },
    utils::date_expr::{DateExprError, date_to_millis},
};

#[derive(Debug, Error)]
pub enum TranslateError {
    #[error(transparent)]
    Interval(#[from] IntervalError),

    #[error("invalid start date: {0}")]
    Start(#[source] DateExprError),

    #[error("invalid end date: {0}")]
    End(#[source] DateExprError),

    #[error("window ends before it starts ({start_ms} > {end_ms})")]
    Inverted { start_ms: i64, end_ms: i64 },
}

/// Result of translating a backfill request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Translation {
    pub interval: Interval,
    pub window: TimeWindow,
}

impl Translation {
    pub const fn step_ms(&self) -> i64 {
        self.interval.step_ms()
    }

    pub const fn start_ms(&self) -> i64 {
        self.window.start_ms
    }

    pub const fn end_ms(&self) -> Option<i64> {
        self.window.end_ms
    }
}

/// Translate `interval`, `start` and optional `end` into a [`Translation`].
///
/// Relative expressions ("24 hours ago", "now") resolve against `now`.
pub fn translate(
    interval: &str,
    start: &str,
    end: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Translation, TranslateError> {
    let interval: Interval = interval.parse()?;
    let start_ms = date_to_millis(start, now).map_err(TranslateError::Start)?;
    let end_ms = end
        .map(|e| date_to_millis(e, now).map_err(TranslateError::End))
        .transpose()?;

    if let Some(end_ms) = end_ms {
        if end_ms < start_ms {
            return Err(TranslateError::Inverted { start_ms, end_ms });
        }
    }

    Ok(Translation {
        interval,
        window: TimeWindow::new(start_ms, end_ms),
    })
}
