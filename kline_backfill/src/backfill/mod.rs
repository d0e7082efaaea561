//! The backfill state machine.
//!
//! [`BackfillEngine`] walks a symbol's candle history page by page:
//!
//! - **Probing**: the symbol has not produced data at the cursor yet. Empty
//!   pages advance the cursor by one step until the first record shows up,
//!   bounded by the window end (or now) and, when set, by `max_probe_calls`.
//! - **Fetching**: every page is handed out and the cursor moves to the last
//!   open time plus one step. A short page (or an empty one) ends the run.
//! - **Done**: terminal.
//!
//! Every request goes through the retry policy and the pacer. The cursor is
//! only touched after a page has arrived, so a failed request never skips
//! data.

pub mod pacing;
pub mod retry;

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::{
    config::Config,
    models::{
        cursor::{BackfillCursor, BackfillState},
        kline::{RawPage, raw_open_time},
    },
    providers::{KlineSource, PageRequest, ProviderError},
    translate::Translation,
    utils::{Clock, SystemClock},
};

pub use pacing::{Pacer, SharedLimiter, shared_limiter};
pub use retry::{RetryPolicy, Transient};

pub const DEFAULT_PAGE_LIMIT: u32 = 500;

#[derive(Debug, Error)]
pub enum BackfillError {
    #[error("{symbol} was never listed in the window (gave up at {cursor_ms} after {probe_calls} probe calls)")]
    NeverListed {
        symbol: String,
        cursor_ms: i64,
        probe_calls: u64,
    },

    #[error("{symbol}: source request failed: {source}")]
    Provider {
        symbol: String,
        source: ProviderError,
    },

    #[error("{symbol}: malformed page: {message}")]
    MalformedPage { symbol: String, message: String },
}

/// Knobs of a single engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackfillOptions {
    pub page_limit: u32,
    pub pause_every: u64,
    pub pause: Duration,
    /// Extra cap on empty probe pages. `None` leaves probing bounded by the
    /// window end (or now) alone.
    pub max_probe_calls: Option<u64>,
}

impl Default for BackfillOptions {
    fn default() -> Self {
        Self {
            page_limit: DEFAULT_PAGE_LIMIT,
            pause_every: 3,
            pause: Duration::from_secs(1),
            max_probe_calls: None,
        }
    }
}

impl BackfillOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            page_limit: config.source.page_limit,
            pause_every: config.backfill.pause_every,
            pause: Duration::from_millis(config.backfill.pause_ms),
            max_probe_calls: config.backfill.max_probe_calls,
        }
    }
}

/// What one step of the state machine produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    /// Records to emit, strictly after everything emitted before.
    pub records: RawPage,
    /// Records the monotonic guard threw away.
    pub dropped: usize,
    /// The request hit a pre-listing gap.
    pub probed: bool,
    pub paused: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BackfillStats {
    pub calls: u64,
    pub pauses: u64,
    pub probe_calls: u64,
    pub records: u64,
    pub dropped: u64,
}

impl BackfillStats {
    pub fn record(&mut self, page: &Page) {
        self.calls += 1;
        self.pauses += page.paused as u64;
        self.probe_calls += page.probed as u64;
        self.records += page.records.len() as u64;
        self.dropped += page.dropped as u64;
    }
}

/// Everything a run-to-completion backfill returns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BackfillOutput {
    pub records: RawPage,
    pub stats: BackfillStats,
}

pub struct BackfillEngine<S> {
    source: S,
    options: BackfillOptions,
    retry: RetryPolicy,
    pacer: Pacer,
    clock: Arc<dyn Clock>,
}

impl<S: KlineSource> BackfillEngine<S> {
    pub fn new(source: S, options: BackfillOptions) -> Self {
        Self {
            source,
            pacer: Pacer::new(options.pause_every, options.pause),
            options,
            retry: RetryPolicy::default(),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_limiter(mut self, limiter: SharedLimiter) -> Self {
        self.pacer = self.pacer.with_limiter(limiter);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Backoff applied to source requests, reused for sink writes.
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Fresh cursor for `translation`.
    pub fn start(&self, symbol: &str, translation: &Translation) -> BackfillCursor {
        BackfillCursor::new(symbol, translation.interval, translation.window)
    }

    /// Run one transition. Returns `Ok(None)` once the cursor is done.
    pub async fn next_page(&self, cursor: &mut BackfillCursor) -> Result<Option<Page>, BackfillError> {
        if cursor.is_done() {
            return Ok(None);
        }

        let step_ms = cursor.interval.step_ms();
        let bound = cursor.window.effective_end(self.clock.now_ms());
        if cursor.start_ms > bound {
            if cursor.state == BackfillState::Probing {
                return Err(never_listed(cursor));
            }
            debug!(symbol = %cursor.symbol, start_ms = cursor.start_ms, "cursor passed the window end");
            cursor.state = BackfillState::Done;
            return Ok(None);
        }
        let probe_cap_hit = self.options.max_probe_calls.is_some_and(|max| cursor.probe_calls >= max);
        if cursor.state == BackfillState::Probing && probe_cap_hit {
            return Err(never_listed(cursor));
        }

        let request = PageRequest {
            symbol: cursor.symbol.clone(),
            interval: cursor.interval,
            limit: self.options.page_limit,
            start_ms: cursor.start_ms,
            end_ms: cursor.window.end_ms,
        };
        let (source, pacer, req) = (&self.source, &self.pacer, &request);
        let raw = self
            .retry
            .retry(&cursor.symbol, || async move {
                pacer.acquire().await;
                source.fetch_page(req).await
            })
            .await
            .map_err(|source| BackfillError::Provider {
                symbol: cursor.symbol.clone(),
                source,
            })?;
        cursor.call_count += 1;

        let limit = self.options.page_limit as usize;
        if raw.len() > limit {
            return Err(BackfillError::MalformedPage {
                symbol: cursor.symbol.clone(),
                message: format!("{} records for a limit of {limit}", raw.len()),
            });
        }

        let mut page = Page::default();
        if raw.is_empty() {
            match cursor.state {
                BackfillState::Probing => {
                    cursor.probe_calls += 1;
                    cursor.start_ms = cursor.start_ms.saturating_add(step_ms);
                    page.probed = true;
                }
                _ => cursor.state = BackfillState::Done,
            }
        } else {
            let last_open = raw.last().and_then(raw_open_time).ok_or_else(|| BackfillError::MalformedPage {
                symbol: cursor.symbol.clone(),
                message: "last record has no open time".to_string(),
            })?;

            if cursor.state == BackfillState::Probing {
                info!(symbol = %cursor.symbol, first_open_ms = raw_open_time(&raw[0]), probe_calls = cursor.probe_calls, "symbol found");
                cursor.state = BackfillState::Fetching;
                cursor.symbol_existed = true;
            }

            let short = raw.len() < limit;
            let (records, dropped) = monotonic(raw, &mut cursor.last_open_time);
            page.records = records;
            page.dropped = dropped;

            let furthest = cursor.last_open_time.map_or(last_open, |t| t.max(last_open));
            cursor.start_ms = furthest.saturating_add(step_ms);
            if short {
                cursor.state = BackfillState::Done;
            }
        }

        debug!(
            symbol = %cursor.symbol,
            call = cursor.call_count,
            state = ?cursor.state,
            records = page.records.len(),
            next_start_ms = cursor.start_ms,
            "page"
        );

        if !cursor.is_done() {
            page.paused = self.pacer.after_call(cursor.call_count).await;
        }
        Ok(Some(page))
    }

    /// Drive `cursor` until done, collecting every record.
    pub async fn run(&self, cursor: &mut BackfillCursor) -> Result<BackfillOutput, BackfillError> {
        let mut output = BackfillOutput::default();
        while let Some(page) = self.next_page(cursor).await? {
            output.stats.record(&page);
            output.records.extend(page.records);
        }
        Ok(output)
    }

    /// Backfill `symbol` over `translation` from scratch.
    pub async fn backfill(&self, symbol: &str, translation: &Translation) -> Result<BackfillOutput, BackfillError> {
        let mut cursor = self.start(symbol, translation);
        self.run(&mut cursor).await
    }
}

fn never_listed(cursor: &BackfillCursor) -> BackfillError {
    BackfillError::NeverListed {
        symbol: cursor.symbol.clone(),
        cursor_ms: cursor.start_ms,
        probe_calls: cursor.probe_calls,
    }
}

/// Drop records at or before `last`, advancing `last` as records pass.
///
/// Records without a readable open time pass through so the normalizer can
/// reject them with a proper reason.
fn monotonic(raw: RawPage, last: &mut Option<i64>) -> (RawPage, usize) {
    let before = raw.len();
    let records: RawPage = raw
        .into_iter()
        .filter(|record| match raw_open_time(record) {
            Some(t) if last.is_some_and(|l| t <= l) => false,
            Some(t) => {
                *last = Some(t);
                true
            }
            None => true,
        })
        .collect();
    let dropped = before - records.len();
    (records, dropped)
}
