//! Symbols in, documents out.
//!
//! For every symbol the pipeline drives the backfill engine page by page,
//! normalizes each record, upserts the resulting documents and checkpoints
//! the cursor. A symbol's failure is recorded in the [`RunSummary`] and the
//! run moves on to the next one.

use std::sync::Arc;

use futures::{StreamExt, stream};
use serde::Serialize;
use tracing::{info, warn};

use crate::{
    backfill::{BackfillEngine, BackfillError, BackfillStats, RetryPolicy},
    errors::{Error, Result},
    io::{CursorStore, DocumentSink, UpsertOutcome},
    models::cursor::BackfillCursor,
    normalizer::normalize,
    providers::KlineSource,
    translate::Translation,
};

/// Per-symbol tally.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SymbolReport {
    pub symbol: String,
    /// Continued from a stored cursor.
    pub resumed: bool,
    pub stats: BackfillStats,
    pub created: u64,
    pub updated: u64,
    pub acknowledged: u64,
    /// Records the normalizer refused.
    pub rejected: u64,
}

impl SymbolReport {
    fn new(symbol: &str, resumed: bool) -> Self {
        Self {
            symbol: symbol.to_string(),
            resumed,
            ..Self::default()
        }
    }

    fn count(&mut self, outcome: UpsertOutcome) {
        match outcome {
            UpsertOutcome::Created => self.created += 1,
            UpsertOutcome::Updated => self.updated += 1,
            UpsertOutcome::Acknowledged => self.acknowledged += 1,
        }
    }

    /// Documents written, new or replaced.
    pub fn documents(&self) -> u64 {
        self.created + self.updated + self.acknowledged
    }
}

#[derive(Debug)]
pub struct SymbolOutcome {
    pub symbol: String,
    pub result: Result<SymbolReport>,
}

/// Outcome of every symbol in a run, in input order.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub outcomes: Vec<SymbolOutcome>,
}

impl RunSummary {
    pub fn succeeded(&self) -> impl Iterator<Item = &SymbolReport> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().ok())
    }

    pub fn failed(&self) -> impl Iterator<Item = (&str, &Error)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o.symbol.as_str(), e)))
    }

    pub fn is_success(&self) -> bool {
        self.failed().next().is_none()
    }

    pub fn documents(&self) -> u64 {
        self.succeeded().map(SymbolReport::documents).sum()
    }
}

pub struct Pipeline<S> {
    engine: BackfillEngine<S>,
    sink: Arc<dyn DocumentSink>,
    /// Backoff for transient sink failures, the engine's by default.
    sink_retry: RetryPolicy,
    cursors: Option<Arc<dyn CursorStore>>,
    concurrency: usize,
}

impl<S: KlineSource> Pipeline<S> {
    pub fn new(engine: BackfillEngine<S>, sink: Arc<dyn DocumentSink>) -> Self {
        Self {
            sink_retry: engine.retry_policy(),
            engine,
            sink,
            cursors: None,
            concurrency: 1,
        }
    }

    pub fn with_cursor_store(mut self, store: Arc<dyn CursorStore>) -> Self {
        self.cursors = Some(store);
        self
    }

    /// Symbols processed at the same time. Pages of one symbol stay sequential.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_sink_retry(mut self, retry: RetryPolicy) -> Self {
        self.sink_retry = retry;
        self
    }

    /// Backfill every symbol over the same translated window.
    pub async fn run(&self, symbols: &[String], translation: &Translation) -> RunSummary {
        let outcomes = stream::iter(symbols)
            .map(|symbol| async move {
                let result = self.run_symbol(symbol, translation).await;
                match &result {
                    Ok(report) => info!(
                        symbol = %symbol,
                        calls = report.stats.calls,
                        probe_calls = report.stats.probe_calls,
                        documents = report.documents(),
                        created = report.created,
                        rejected = report.rejected,
                        "symbol finished"
                    ),
                    Err(e) => warn!(symbol = %symbol, error = %e, "symbol failed"),
                }
                SymbolOutcome {
                    symbol: symbol.clone(),
                    result,
                }
            })
            .buffered(self.concurrency)
            .collect::<Vec<_>>()
            .await;

        RunSummary { outcomes }
    }

    /// Backfill one symbol, sinking and checkpointing after every page.
    pub async fn run_symbol(&self, symbol: &str, translation: &Translation) -> Result<SymbolReport> {
        let (mut cursor, resumed) = self.initial_cursor(symbol, translation)?;
        info!(
            symbol = %symbol,
            interval = %translation.interval,
            start_ms = cursor.start_ms,
            end_ms = ?cursor.window.end_ms,
            resumed,
            "backfill started"
        );

        let mut report = SymbolReport::new(symbol, resumed);
        loop {
            let page = match self.engine.next_page(&mut cursor).await {
                Ok(Some(page)) => page,
                Ok(None) => break,
                Err(e) => {
                    if matches!(e, BackfillError::NeverListed { .. }) {
                        self.forget(symbol)?;
                    }
                    return Err(e.into());
                }
            };
            report.stats.record(&page);
            if page.dropped > 0 {
                warn!(symbol = %symbol, dropped = page.dropped, "dropped records at or before the last emitted open time");
            }

            for raw in &page.records {
                match normalize(raw) {
                    Ok(kline) => {
                        let document = kline.to_document(symbol);
                        let (sink, doc) = (&self.sink, &document);
                        let outcome = self
                            .sink_retry
                            .retry(&document.id, move || sink.upsert(doc))
                            .await?;
                        report.count(outcome);
                    }
                    Err(e) => {
                        warn!(symbol = %symbol, error = %e, record = %raw, "dropping record");
                        report.rejected += 1;
                    }
                }
            }

            if !cursor.is_done() {
                self.checkpoint(&cursor)?;
            }
        }

        self.forget(symbol)?;
        Ok(report)
    }

    fn initial_cursor(&self, symbol: &str, translation: &Translation) -> Result<(BackfillCursor, bool)> {
        let fresh = self.engine.start(symbol, translation);
        let Some(store) = &self.cursors else {
            return Ok((fresh, false));
        };

        match store.load(symbol)? {
            Some(stored) if stored.symbol == symbol && stored.can_resume(translation.interval, &translation.window) => {
                Ok((stored.resume_into(translation.window), true))
            }
            Some(stored) => {
                info!(
                    symbol = %symbol,
                    stored_interval = %stored.interval,
                    stored_start_ms = stored.window.start_ms,
                    "stored cursor does not cover this request, starting over"
                );
                Ok((fresh, false))
            }
            None => Ok((fresh, false)),
        }
    }

    fn checkpoint(&self, cursor: &BackfillCursor) -> Result<()> {
        if let Some(store) = &self.cursors {
            store.save(cursor)?;
        }
        Ok(())
    }

    fn forget(&self, symbol: &str) -> Result<()> {
        if let Some(store) = &self.cursors {
            store.clear(symbol)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::{
        backfill::{BackfillOptions, RetryPolicy},
        io::MemorySink,
        models::{kline::RawPage, window::TimeWindow},
        providers::{ApiSnafu, PageRequest, ProviderError},
    };

    const STEP: i64 = 1_800_000;

    /// Two candles (after one unreadable record) for ETHBTC, an API error
    /// for anything else.
    struct TwoCandles;

    #[async_trait]
    impl KlineSource for TwoCandles {
        async fn fetch_page(&self, request: &PageRequest) -> std::result::Result<RawPage, ProviderError> {
            if request.symbol != "ETHBTC" {
                return ApiSnafu { message: "Invalid symbol." }.fail();
            }
            let mut page = Vec::new();
            if request.start_ms == 0 {
                page.push(json!(["garbage"]));
            }
            page.extend(
                [0, STEP]
                    .into_iter()
                    .filter(|t| *t >= request.start_ms)
                    .map(|t| json!([t, "1.0", "2", "0.5", "3.0", "10", t + STEP - 1, "1", 4, "1", "1", "0"])),
            );
            Ok(page)
        }
    }

    fn pipeline(sink: Arc<MemorySink>) -> Pipeline<TwoCandles> {
        let options = BackfillOptions {
            pause: Duration::ZERO,
            ..BackfillOptions::default()
        };
        let engine = BackfillEngine::new(TwoCandles, options).with_retry(RetryPolicy::none());
        Pipeline::new(engine, sink)
    }

    fn translation() -> Translation {
        Translation {
            interval: "30m".parse().unwrap(),
            window: TimeWindow::new(0, Some(10 * STEP)),
        }
    }

    #[tokio::test]
    async fn failures_are_isolated_per_symbol() {
        let sink = Arc::new(MemorySink::new());
        let symbols = vec!["ETHBTC".to_string(), "NOPE".to_string()];
        let summary = pipeline(sink.clone()).run(&symbols, &translation()).await;

        assert!(!summary.is_success());
        let failed: Vec<&str> = summary.failed().map(|(s, _)| s).collect();
        assert_eq!(failed, ["NOPE"]);

        let report = summary.succeeded().next().unwrap();
        assert_eq!(report.created, 2);
        assert_eq!(report.rejected, 1);
        assert_eq!(summary.documents(), 2);
        assert_eq!(sink.len(), 2);
        assert_eq!(sink.documents()[0].body.value, 2.0);
    }

    #[tokio::test]
    async fn replays_update_instead_of_duplicating() {
        let sink = Arc::new(MemorySink::new());
        let p = pipeline(sink.clone());
        let first = p.run_symbol("ETHBTC", &translation()).await.unwrap();
        let second = p.run_symbol("ETHBTC", &translation()).await.unwrap();

        assert_eq!((first.created, first.updated), (2, 0));
        assert_eq!((second.created, second.updated), (0, 2));
        assert_eq!(sink.len(), 2);
    }
}
