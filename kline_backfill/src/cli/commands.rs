use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "kline-backfill", author, version, about)]
pub struct Cli {
    /// Path to the config file (kline_backfill.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Backfill candles for one or more symbols into the sink
    Run(RunArgs),

    /// Translate an interval and date expressions to epoch milliseconds
    Resolve {
        /// Interval code: m (minute), h (hour), d (day), w (week), e.g. "30m"
        #[arg(long)]
        interval: String,

        /// Start date, e.g. "24 hours ago UTC" or "January 01, 2018"
        #[arg(long)]
        start: String,

        /// End date; omit for open-ended
        #[arg(long)]
        end: Option<String>,
    },

    /// Inspect or remove persisted backfill cursors
    #[command(subcommand)]
    Cursor(CursorCommands),
}

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Newline-delimited file of symbols
    #[arg(long)]
    pub symbols_file: Option<PathBuf>,

    /// Symbol to backfill (repeatable)
    #[arg(long = "symbol")]
    pub symbols: Vec<String>,

    /// Interval code, overrides `backfill.interval`
    #[arg(long)]
    pub interval: Option<String>,

    /// Start date expression, overrides `backfill.start`
    #[arg(long)]
    pub start: Option<String>,

    /// End date expression, overrides `backfill.end`
    #[arg(long, conflicts_with = "open_ended")]
    pub end: Option<String>,

    /// Ignore any configured end and run up to now
    #[arg(long)]
    pub open_ended: bool,

    /// Print documents as JSON lines instead of writing to the sink
    #[arg(long)]
    pub dry_run: bool,

    /// Symbols to backfill at the same time
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Give up on a symbol after this many empty pages before its first
    /// candle. By default probing only stops at the window end (or now).
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub max_probe_calls: Option<u64>,
}

#[derive(Subcommand)]
pub enum CursorCommands {
    /// Print the stored cursor of a symbol
    Show { symbol: String },

    /// Delete the stored cursor of a symbol
    Clear { symbol: String },
}
