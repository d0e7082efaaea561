//! Command-line entry points.

pub mod commands;
pub mod params;

use std::{
    io::{self, Write},
    num::NonZeroU32,
    sync::Arc,
};

use anyhow::{Context, Result, bail};
use chrono::Utc;
use serde_json::json;

use crate::{
    backfill::{BackfillEngine, RetryPolicy, shared_limiter},
    config::Config,
    io::{CursorStore, DocumentSink, ElasticsearchSink, FileCursorStore, MemorySink},
    pipeline::{Pipeline, RunSummary},
    providers::binance_rest::BinanceProvider,
    translate::translate,
};

use commands::{Commands, CursorCommands, RunArgs};

/// Run a parsed command. `Ok(false)` means it ran but something failed.
pub async fn execute(command: Commands, config: Config) -> Result<bool> {
    match command {
        Commands::Run(args) => run(args, config).await,
        Commands::Resolve { interval, start, end } => {
            let t = translate(&interval, &start, end.as_deref(), Utc::now())?;
            let out = json!({
                "interval": t.interval,
                "step_ms": t.step_ms(),
                "start_ms": t.start_ms(),
                "end_ms": t.end_ms(),
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
            Ok(true)
        }
        Commands::Cursor(command) => cursor(command, &config),
    }
}

async fn run(args: RunArgs, config: Config) -> Result<bool> {
    let symbols = params::collect_symbols(&args)?;
    let window = params::window_params(&args, &config.backfill);
    let translation = translate(&window.interval, &window.start, window.end.as_deref(), Utc::now())?;
    let concurrency = args.concurrency.unwrap_or(config.backfill.concurrency);

    let requests_per_minute = NonZeroU32::new(config.source.requests_per_minute)
        .context("source.requests_per_minute must be at least 1")?;
    let provider = BinanceProvider::from_config(&config.source)?;
    let engine = BackfillEngine::new(provider, params::backfill_options(&args, &config))
        .with_retry(RetryPolicy::from_config(&config.retry))
        .with_limiter(shared_limiter(requests_per_minute));

    let memory = args.dry_run.then(|| Arc::new(MemorySink::new()));
    let sink: Arc<dyn DocumentSink> = match &memory {
        Some(memory) => memory.clone(),
        None => Arc::new(ElasticsearchSink::from_config(&config.sink)?),
    };

    let mut pipeline = Pipeline::new(engine, sink).with_concurrency(concurrency);
    if let (Some(dir), false) = (&config.cursor.dir, args.dry_run) {
        pipeline = pipeline.with_cursor_store(Arc::new(FileCursorStore::new(dir)));
    }

    let summary = pipeline.run(&symbols, &translation).await;

    if let Some(memory) = memory {
        let mut out = io::stdout().lock();
        for document in memory.documents() {
            serde_json::to_writer(&mut out, &document)?;
            writeln!(out)?;
        }
    }
    print_summary(&summary);
    Ok(summary.is_success())
}

fn print_summary(summary: &RunSummary) {
    for report in summary.succeeded() {
        eprintln!(
            "{:<12} ok      calls={} probes={} documents={} (new {}) rejected={} dropped={}{}",
            report.symbol,
            report.stats.calls,
            report.stats.probe_calls,
            report.documents(),
            report.created,
            report.rejected,
            report.stats.dropped,
            if report.resumed { " resumed" } else { "" },
        );
    }
    for (symbol, error) in summary.failed() {
        eprintln!("{symbol:<12} FAILED  {error}");
    }
    let failed = summary.failed().count();
    eprintln!(
        "{} symbols, {} failed, {} documents",
        summary.outcomes.len(),
        failed,
        summary.documents()
    );
}

fn cursor(command: CursorCommands, config: &Config) -> Result<bool> {
    let Some(dir) = &config.cursor.dir else {
        bail!("cursor.dir is not configured");
    };
    let store = FileCursorStore::new(dir);
    match command {
        CursorCommands::Show { symbol } => match store.load(&symbol)? {
            Some(cursor) => println!("{}", serde_json::to_string_pretty(&cursor)?),
            None => eprintln!("no cursor stored for {symbol}"),
        },
        CursorCommands::Clear { symbol } => {
            if store.clear(&symbol)? {
                eprintln!("cleared cursor for {symbol}");
            } else {
                eprintln!("no cursor stored for {symbol}");
            }
        }
    }
    Ok(true)
}
