use thiserror::Error;

use crate::{
    backfill::BackfillError,
    config::ConfigError,
    io::{CursorStoreError, SinkError, SymbolsError},
    providers::ProviderInitError,
    translate::TranslateError,
};

/// Top-level error for the kline_backfill crate.
#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("translation error: {0}")]
    Translate(#[from] TranslateError),

    #[error("symbol list error: {0}")]
    Symbols(#[from] SymbolsError),

    #[error("provider setup error: {0}")]
    ProviderInit(#[from] ProviderInitError),

    #[error("backfill error: {0}")]
    Backfill(#[from] BackfillError),

    #[error("sink error: {0}")]
    Sink(#[from] SinkError),

    #[error("cursor store error: {0}")]
    CursorStore(#[from] CursorStoreError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
