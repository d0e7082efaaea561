use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use snafu::ResultExt;
use tracing::debug;

use crate::{
    config::SourceConfig,
    models::kline::RawPage,
    providers::{
        ApiSnafu, ClientBuildSnafu, InvalidBaseUrlSnafu, KlineSource, MalformedPageSnafu,
        PageRequest, ProviderError, ProviderInitError, RateLimitedSnafu, ReqwestSnafu,
        ServerSnafu,
        binance_rest::{
            params::{construct_params, validate_request},
            response::BinanceErrorBody,
        },
    },
};

pub const DEFAULT_BASE_URL: &str = "https://api.binance.com";
const KLINES_PATH: &str = "api/v3/klines";

/// Public (unauthenticated) klines endpoint of a Binance-compatible exchange.
pub struct BinanceProvider {
    client: Client,
    klines_url: Url,
}

impl BinanceProvider {
    /// Creates a provider against `base_url` (scheme + host, optional path prefix).
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ProviderInitError> {
        let klines_url = klines_url(base_url)?;
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("kline_backfill/", env!("CARGO_PKG_VERSION")))
            .build()
            .context(ClientBuildSnafu)?;

        Ok(Self { client, klines_url })
    }

    pub fn from_config(config: &SourceConfig) -> Result<Self, ProviderInitError> {
        Self::new(&config.base_url, Duration::from_secs(config.timeout_secs))
    }

    pub fn klines_url(&self) -> &Url {
        &self.klines_url
    }
}

fn klines_url(base_url: &str) -> Result<Url, ProviderInitError> {
    let mut base = base_url.trim().to_string();
    if !base.ends_with('/') {
        base.push('/');
    }
    Url::parse(&base)
        .ok()
        .filter(|u| matches!(u.scheme(), "http" | "https"))
        .and_then(|u| u.join(KLINES_PATH).ok())
        .ok_or_else(|| InvalidBaseUrlSnafu { url: base_url }.build())
}

/// Map a non-2xx response onto the error taxonomy.
fn status_error(status: StatusCode, body: String) -> ProviderError {
    if status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() == 418 {
        return RateLimitedSnafu { status: status.as_u16() }.build();
    }
    if status.is_server_error() {
        return ServerSnafu {
            status: status.as_u16(),
            message: body,
        }
        .build();
    }
    let message = match BinanceErrorBody::parse(&body) {
        Some(err) => format!("{} ({})", err.msg, err.code),
        None => format!("HTTP {status}: {body}"),
    };
    ApiSnafu { message }.build()
}

/// Decode a 2xx klines body: a JSON array of at most `limit` records.
fn parse_page(body: &str, limit: u32) -> Result<RawPage, ProviderError> {
    let page: RawPage = serde_json::from_str(body).map_err(|e| {
        MalformedPageSnafu {
            message: format!("expected a JSON array of klines: {e}"),
        }
        .build()
    })?;
    if page.len() > limit as usize {
        return MalformedPageSnafu {
            message: format!("{} records for limit {limit}", page.len()),
        }
        .fail();
    }
    Ok(page)
}

#[async_trait]
impl KlineSource for BinanceProvider {
    async fn fetch_page(&self, request: &PageRequest) -> Result<RawPage, ProviderError> {
        validate_request(request)?;

        let query = construct_params(request);
        let response = self
            .client
            .get(self.klines_url.clone())
            .query(&query)
            .send()
            .await
            .context(ReqwestSnafu)?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown API error".to_string());
            return Err(status_error(status, body));
        }

        let body = response.text().await.context(ReqwestSnafu)?;
        let page = parse_page(&body, request.limit)?;

        debug!(symbol = %request.symbol, start_ms = request.start_ms, records = page.len(), "fetched page");
        Ok(page)
    }
}
