use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use tally_core::{CurrencyCode, Error};

/// Configuration for the outbound rate-quote call.
#[derive(Debug, Clone)]
pub struct RateConfig {
    /// Base URL of the quote service; the source currency code is
    /// appended as the final path segment.
    pub base_url: String,
    pub connect_timeout_ms: u64,
    pub read_timeout_ms: u64,
}

impl Default for RateConfig {
    fn default() -> Self {
        Self {
            // ExchangeRate-API free tier endpoint.
            base_url: "https://open.er-api.com/v6/latest".to_string(),
            connect_timeout_ms: 20_000,
            read_timeout_ms: 25_000,
        }
    }
}

/// Rate table for one base currency as returned by the quote service.
#[derive(Debug, Clone)]
pub struct RateTable {
    pub rates: HashMap<String, f64>,
}

impl RateTable {
    /// Rate for a target currency, if the service quotes it.
    #[must_use]
    pub fn rate_for(&self, code: &CurrencyCode) -> Option<f64> {
        self.rates.get(code.as_str()).copied()
    }
}

/// Source of exchange-rate tables. The production implementation is an
/// HTTP client; tests substitute an in-memory source.
#[async_trait]
pub trait RateSource: Send + Sync {
    /// Fetch the latest rate table keyed by the given base currency.
    /// Makes at most one attempt; callers do not retry.
    async fn latest(&self, base: &CurrencyCode) -> Result<RateTable, Error>;
}

/// Wire shape of the quote service response.
#[derive(Debug, Deserialize)]
struct QuoteResponse {
    #[serde(default)]
    result: String,
    #[serde(default)]
    rates: HashMap<String, f64>,
    #[serde(default, rename = "error-type")]
    error_type: Option<String>,
}

/// HTTP-backed rate source with bounded connect and read timeouts.
pub struct HttpRateSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRateSource {
    pub fn new(config: &RateConfig) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .timeout(Duration::from_millis(config.read_timeout_ms))
            .build()
            .map_err(|e| Error::Internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl RateSource for HttpRateSource {
    async fn latest(&self, base: &CurrencyCode) -> Result<RateTable, Error> {
        let url = format!("{}/{}", self.base_url, base);
        tracing::debug!("fetching exchange rates from {url}");

        let response = self.client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() || e.is_connect() {
                Error::Network(format!("rate lookup timed out or could not connect: {e}"))
            } else {
                Error::Network(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Upstream(format!(
                "rate service returned HTTP {status}"
            )));
        }

        let body: QuoteResponse = response
            .json()
            .await
            .map_err(|e| Error::Upstream(format!("malformed rate response: {e}")))?;

        if body.result != "success" {
            let reason = body
                .error_type
                .unwrap_or_else(|| "unknown error".to_string());
            return Err(Error::Upstream(reason));
        }

        Ok(RateTable { rates: body.rates })
    }
}
