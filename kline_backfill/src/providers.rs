//! Provider abstraction for candle sources.
//!
//! This module defines the [`KlineSource`] trait, the interface the backfill
//! engine pages through. A source answers one bounded page request at a time;
//! pagination, probing and pacing are the engine's job, not the provider's.
//!
//! Each concrete exchange implements [`KlineSource`] to handle vendor-specific
//! request building and error mapping. The trait is async and object safe, so
//! tests can drive the engine with in-memory doubles.
//!
//! # Example
//!
//! ```rust
//! use async_trait::async_trait;
//! use kline_backfill::models::kline::RawPage;
//! use kline_backfill::providers::{KlineSource, PageRequest, ProviderError};
//!
//! struct NothingListed;
//!
//! #[async_trait]
//! impl KlineSource for NothingListed {
//!     async fn fetch_page(&self, _request: &PageRequest) -> Result<RawPage, ProviderError> {
//!         Ok(vec![])
//!     }
//! }
//! ```

pub mod binance_rest;

use async_trait::async_trait;
use serde::Serialize;
use snafu::{Backtrace, Snafu};

use crate::models::{interval::Interval, kline::RawPage};

/// One bounded page request: at most `limit` records with open time in
/// `[start_ms, end_ms]`, ascending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageRequest {
    pub symbol: String,
    pub interval: Interval,
    pub limit: u32,
    pub start_ms: i64,
    /// `None` leaves the end open; the source returns whatever it has.
    pub end_ms: Option<i64>,
}

/// Trait for fetching pages of raw candles from a market data source.
#[async_trait]
pub trait KlineSource: Send + Sync {
    /// Fetch one page.
    ///
    /// Returns at most `request.limit` records ordered by open time. An empty
    /// page means the source has nothing at or after `start_ms` within the
    /// requested bounds.
    async fn fetch_page(&self, request: &PageRequest) -> Result<RawPage, ProviderError>;
}

#[async_trait]
impl<T: KlineSource + ?Sized> KlineSource for std::sync::Arc<T> {
    async fn fetch_page(&self, request: &PageRequest) -> Result<RawPage, ProviderError> {
        (**self).fetch_page(request).await
    }
}

/// Errors that can occur during the creation of a provider instance.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ProviderInitError {
    /// failed to init reqwest client
    #[snafu(display("Failed to build HTTP client: {source}"))]
    ClientBuild {
        source: reqwest::Error,
        backtrace: Backtrace,
    },

    /// The configured base URL can't be used.
    #[snafu(display("Invalid base URL {url:?}"))]
    InvalidBaseUrl { url: String, backtrace: Backtrace },
}

/// Errors that can occur within a `KlineSource` implementation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ProviderError {
    /// An error during an API request (e.g., network failure, timeout).
    #[snafu(display("API request failed: {source}"))]
    Reqwest {
        source: reqwest::Error,
        backtrace: Backtrace,
    },

    /// The source rejected the request for exceeding its rate limits.
    #[snafu(display("Rate limited by source (HTTP {status})"))]
    RateLimited { status: u16, backtrace: Backtrace },

    /// The source failed on its side (HTTP 5xx).
    #[snafu(display("Source unavailable (HTTP {status}): {message}"))]
    Server {
        status: u16,
        message: String,
        backtrace: Backtrace,
    },

    /// The provider's API returned a specific error message (e.g., invalid symbol).
    #[snafu(display("API error: {message}"))]
    Api {
        message: String,
        backtrace: Backtrace,
    },

    /// The request parameters were invalid for this specific provider.
    #[snafu(display("Invalid parameters for provider: {message}"))]
    Validation {
        message: String,
        backtrace: Backtrace,
    },

    /// The response could not be used as a page.
    #[snafu(display("Malformed page: {message}"))]
    MalformedPage {
        message: String,
        backtrace: Backtrace,
    },
}

impl ProviderError {
    /// Whether retrying the same request may succeed.
    ///
    /// Timeouts, connection failures, rate-limit rejections and 5xx responses
    /// are transient. Everything else fails the same way again.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::Reqwest { source, .. } => {
                source.is_timeout() || source.is_connect() || (source.is_request() && !source.is_builder())
            }
            ProviderError::RateLimited { .. } | ProviderError::Server { .. } => true,
            ProviderError::Api { .. }
            | ProviderError::Validation { .. }
            | ProviderError::MalformedPage { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    struct Empty;
    struct Failing;

    #[async_trait]
    impl KlineSource for Empty {
        async fn fetch_page(&self, _request: &PageRequest) -> Result<RawPage, ProviderError> {
            Ok(vec![])
        }
    }

    #[async_trait]
    impl KlineSource for Failing {
        async fn fetch_page(&self, _request: &PageRequest) -> Result<RawPage, ProviderError> {
            ServerSnafu {
                status: 503u16,
                message: "maintenance",
            }
            .fail()
        }
    }

    // Chosen at runtime, so it has to come back boxed.
    fn get_source(name: &str) -> Box<dyn KlineSource> {
        if name == "empty" { Box::new(Empty) } else { Box::new(Failing) }
    }

    fn request() -> PageRequest {
        PageRequest {
            symbol: "ETHBTC".into(),
            interval: "30m".parse().unwrap(),
            limit: 500,
            start_ms: 0,
            end_ms: None,
        }
    }

    #[tokio::test]
    async fn test_dynamic_source() {
        assert!(get_source("empty").fetch_page(&request()).await.unwrap().is_empty());

        let err = get_source("failing").fetch_page(&request()).await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(err.to_string(), "Source unavailable (HTTP 503): maintenance");
    }

    #[tokio::test]
    async fn arc_sources_delegate() {
        let shared: Arc<dyn KlineSource> = Arc::new(Empty);
        assert!(shared.fetch_page(&request()).await.unwrap().is_empty());
    }

    #[test]
    fn classification() {
        assert!(RateLimitedSnafu { status: 429u16 }.build().is_transient());
        assert!(!ApiSnafu { message: "Invalid symbol." }.build().is_transient());
        assert!(!ValidationSnafu { message: "limit" }.build().is_transient());
        assert!(!MalformedPageSnafu { message: "not an array" }.build().is_transient());
    }
}
