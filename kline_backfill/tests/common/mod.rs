#![allow(dead_code)]

use std::{
    collections::{HashMap, VecDeque},
    sync::{
        Arc, Mutex,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use kline_backfill::{
    backfill::{BackfillEngine, BackfillOptions, RetryPolicy},
    io::{DocumentSink, MemorySink, SinkError, UpsertOutcome, sink::RejectedSnafu},
    models::{document::Document, kline::RawPage},
    providers::{ApiSnafu, KlineSource, PageRequest, ProviderError},
    utils::FixedClock,
};
use serde_json::json;

pub const STEP_30M: i64 = 1_800_000;

/// 2018-02-12T12:00:00Z
pub fn noon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2018, 2, 12, 12, 0, 0).unwrap()
}

/// Candle history of one symbol: open times on the interval grid starting at
/// `listed_at`, strictly before `until`.
#[derive(Debug, Clone, Copy)]
pub struct Listing {
    pub listed_at: i64,
    pub until: i64,
}

/// In-memory exchange answering page requests like the real klines endpoint.
///
/// With `dark_before_listing`, any request starting before the listing comes
/// back empty, which is what drives the engine's probing phase.
#[derive(Default)]
pub struct FakeExchange {
    listings: Mutex<HashMap<String, Listing>>,
    dark_before_listing: bool,
    failures: Mutex<VecDeque<ProviderError>>,
    requests: Mutex<Vec<PageRequest>>,
}

impl FakeExchange {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dark_before_listing() -> Self {
        Self {
            dark_before_listing: true,
            ..Self::default()
        }
    }

    pub fn list(self, symbol: &str, listed_at: i64, until: i64) -> Self {
        self.set_listing(symbol, listed_at, until);
        self
    }

    /// Extend or replace a listing, e.g. to let time pass between runs.
    pub fn set_listing(&self, symbol: &str, listed_at: i64, until: i64) {
        self.listings
            .lock()
            .unwrap()
            .insert(symbol.to_string(), Listing { listed_at, until });
    }

    /// The next requests fail with these errors, in order.
    pub fn fail_next(&self, errors: impl IntoIterator<Item = ProviderError>) {
        self.failures.lock().unwrap().extend(errors);
    }

    pub fn requests(&self) -> Vec<PageRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn clear_requests(&self) {
        self.requests.lock().unwrap().clear();
    }

    /// Open times the exchange holds for `symbol` within `[start, end]`.
    pub fn open_times(&self, symbol: &str, step: i64, start: i64, end: i64) -> Vec<i64> {
        let listing = self.listings.lock().unwrap()[symbol];
        (0..)
            .map(|k| listing.listed_at + k * step)
            .take_while(|t| *t < listing.until && *t <= end)
            .filter(|t| *t >= start)
            .collect()
    }
}

/// Deterministic candle: prices depend only on the open time.
pub fn candle(open_time: i64, step: i64) -> serde_json::Value {
    let n = (open_time / step) % 1000;
    let open = format!("{:.8}", 0.0001 + n as f64 * 0.000001);
    let close = format!("{:.8}", 0.0001 + (n + 1) as f64 * 0.000001);
    json!([
        open_time,
        open,
        "0.00020000",
        "0.00005000",
        close,
        "31037.00000000",
        open_time + step - 1,
        "4.30812629",
        218,
        "20036.00000000",
        "2.78273283",
        "0"
    ])
}

#[async_trait]
impl KlineSource for FakeExchange {
    async fn fetch_page(&self, request: &PageRequest) -> Result<RawPage, ProviderError> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(err) = self.failures.lock().unwrap().pop_front() {
            return Err(err);
        }

        let Some(listing) = self.listings.lock().unwrap().get(&request.symbol).copied() else {
            return ApiSnafu { message: "Invalid symbol." }.fail();
        };
        if self.dark_before_listing && request.start_ms < listing.listed_at {
            return Ok(vec![]);
        }

        let step = request.interval.step_ms();
        let first = if request.start_ms <= listing.listed_at {
            0
        } else {
            (request.start_ms - listing.listed_at + step - 1) / step
        };
        Ok((first..)
            .map(|k| listing.listed_at + k * step)
            .take_while(|t| *t < listing.until && request.end_ms.is_none_or(|end| *t <= end))
            .take(request.limit as usize)
            .map(|t| candle(t, step))
            .collect())
    }
}

pub fn options(page_limit: u32) -> BackfillOptions {
    BackfillOptions {
        page_limit,
        pause_every: 3,
        pause: Duration::ZERO,
        max_probe_calls: None,
    }
}

/// Engine over `exchange` with no pauses and a clock frozen at `now`.
pub fn engine(exchange: Arc<FakeExchange>, page_limit: u32, now: DateTime<Utc>) -> BackfillEngine<Arc<FakeExchange>> {
    BackfillEngine::new(exchange, options(page_limit))
        .with_retry(RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
        })
        .with_clock(Arc::new(FixedClock(now)))
}

/// Memory sink that answers 503 to the upserts numbered `fail_from..fail_until`
/// (1-based, every attempt counts).
pub struct FlakySink {
    pub inner: Arc<MemorySink>,
    fail_from: u64,
    fail_until: u64,
    seen: AtomicU64,
}

impl FlakySink {
    /// A single failed attempt, the `at`-th.
    pub fn blip(inner: Arc<MemorySink>, at: u64) -> Self {
        Self::failing(inner, at, at + 1)
    }

    /// Every attempt from the `from`-th on fails.
    pub fn down_from(inner: Arc<MemorySink>, from: u64) -> Self {
        Self::failing(inner, from, u64::MAX)
    }

    fn failing(inner: Arc<MemorySink>, fail_from: u64, fail_until: u64) -> Self {
        Self {
            inner,
            fail_from,
            fail_until,
            seen: AtomicU64::new(0),
        }
    }

    /// Upsert attempts so far, failed ones included.
    pub fn attempts(&self) -> u64 {
        self.seen.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentSink for FlakySink {
    async fn upsert(&self, document: &Document) -> Result<UpsertOutcome, SinkError> {
        let n = self.seen.fetch_add(1, Ordering::SeqCst) + 1;
        if (self.fail_from..self.fail_until).contains(&n) {
            return RejectedSnafu {
                id: &document.id,
                status: 503u16,
                body: "index unavailable",
            }
            .fail();
        }
        self.inner.upsert(document).await
    }
}
