use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use kline_backfill::{
    cli::{self, commands::Cli},
    config::Config,
};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // stdout is reserved for command output
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("kline_backfill=info"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    let ok = cli::execute(cli.command, config).await?;
    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
