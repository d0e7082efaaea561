use crate::{
    backfill::BackfillOptions,
    config::{BackfillConfig, Config},
    io::{SymbolsError, read_symbols},
};

use super::commands::RunArgs;

/// Interval and date expressions for a run, after applying CLI overrides.
#[derive(Debug, PartialEq, Eq)]
pub struct WindowParams {
    pub interval: String,
    pub start: String,
    pub end: Option<String>,
}

/// `--symbols-file` entries followed by `--symbol` flags, first occurrence wins.
pub fn collect_symbols(args: &RunArgs) -> Result<Vec<String>, SymbolsError> {
    let mut symbols = match &args.symbols_file {
        Some(path) => read_symbols(path)?,
        None => Vec::new(),
    };
    for symbol in &args.symbols {
        let symbol = symbol.trim();
        if !symbol.is_empty() && !symbols.iter().any(|s| s == symbol) {
            symbols.push(symbol.to_string());
        }
    }
    if symbols.is_empty() {
        return Err(SymbolsError::Empty("--symbol / --symbols-file".to_string()));
    }
    Ok(symbols)
}

pub fn window_params(args: &RunArgs, config: &BackfillConfig) -> WindowParams {
    let end = if args.open_ended {
        None
    } else {
        args.end.clone().or_else(|| config.end.clone())
    };
    WindowParams {
        interval: args
            .interval
            .clone()
            .unwrap_or_else(|| config.interval.to_string()),
        start: args.start.clone().unwrap_or_else(|| config.start.clone()),
        end,
    }
}

/// Engine options from config, with `--max-probe-calls` taking precedence.
pub fn backfill_options(args: &RunArgs, config: &Config) -> BackfillOptions {
    let mut options = BackfillOptions::from_config(config);
    if args.max_probe_calls.is_some() {
        options.max_probe_calls = args.max_probe_calls;
    }
    options
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use clap::Parser;

    use super::*;
    use crate::cli::commands::{Cli, Commands};

    fn run_args(argv: &[&str]) -> RunArgs {
        let cli = Cli::try_parse_from(["kline-backfill", "run"].iter().chain(argv).copied()).unwrap();
        match cli.command {
            Commands::Run(args) => args,
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn merges_file_and_flag_symbols() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "ETHBTC\nLTCBTC").unwrap();
        let path = file.path().to_str().unwrap();

        let args = run_args(&["--symbols-file", path, "--symbol", "BNBBTC", "--symbol", "ETHBTC"]);
        assert_eq!(collect_symbols(&args).unwrap(), ["ETHBTC", "LTCBTC", "BNBBTC"]);
    }

    #[test]
    fn no_symbols_is_an_error() {
        assert!(matches!(collect_symbols(&run_args(&[])), Err(SymbolsError::Empty(_))));
    }

    #[test]
    fn flags_override_config() {
        let config = BackfillConfig {
            end: Some("now".into()),
            ..BackfillConfig::default()
        };

        let w = window_params(&run_args(&[]), &config);
        assert_eq!(
            w,
            WindowParams {
                interval: "30m".into(),
                start: "24 hours ago UTC".into(),
                end: Some("now".into()),
            }
        );

        let w = window_params(&run_args(&["--interval", "1d", "--start", "January 01, 2018", "--open-ended"]), &config);
        assert_eq!(w.interval, "1d");
        assert_eq!(w.start, "January 01, 2018");
        assert_eq!(w.end, None);

        let w = window_params(&run_args(&["--end", "1 hour ago"]), &config);
        assert_eq!(w.end.as_deref(), Some("1 hour ago"));
    }

    #[test]
    fn end_and_open_ended_conflict() {
        assert!(Cli::try_parse_from(["kline-backfill", "run", "--end", "now", "--open-ended"]).is_err());
    }

    #[test]
    fn probe_cap_is_unset_unless_asked_for() {
        let config = Config::default();
        assert_eq!(backfill_options(&run_args(&[]), &config).max_probe_calls, None);
        assert_eq!(
            backfill_options(&run_args(&["--max-probe-calls", "20000"]), &config).max_probe_calls,
            Some(20_000)
        );
        assert!(Cli::try_parse_from(["kline-backfill", "run", "--max-probe-calls", "0"]).is_err());
    }
}
