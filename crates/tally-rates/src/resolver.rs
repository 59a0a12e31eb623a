use std::sync::Arc;

use chrono::Utc;

use tally_core::{CurrencyCode, Error, ExchangeQuote};

use crate::rounding::round_half_up;
use crate::source::RateSource;

const RATE_SCALE: usize = 4;

/// Resolves exchange rates and converts amounts between currencies.
///
/// Input validation runs before any network access, and a same-currency
/// pair never touches the source at all. The underlying source is
/// consulted exactly once per lookup; failed lookups are not retried.
#[derive(Clone)]
pub struct RateResolver {
    source: Arc<dyn RateSource>,
}

impl RateResolver {
    pub fn new(source: Arc<dyn RateSource>) -> Self {
        Self { source }
    }

    /// Resolve the exchange rate between two currencies, rounded to
    /// four decimal places.
    pub async fn resolve(&self, from: &str, to: &str) -> Result<ExchangeQuote, Error> {
        let from = CurrencyCode::parse(from)?;
        let to = CurrencyCode::parse(to)?;

        // Same-currency fast path: no network call.
        if from == to {
            tracing::info!("exchange rate {from} -> {to} = 1 (same currency)");
            return Ok(ExchangeQuote {
                from,
                to,
                rate: 1.0,
                as_of: Utc::now(),
            });
        }

        let rate = self.lookup(&from, &to).await?;
        Ok(ExchangeQuote {
            from,
            to,
            rate: round_half_up(rate, RATE_SCALE),
            as_of: Utc::now(),
        })
    }

    /// Convert an amount between currencies, rounded to four decimal
    /// places. Negative amounts are rejected before anything else.
    pub async fn convert(&self, amount: f64, from: &str, to: &str) -> Result<f64, Error> {
        if amount < 0.0 {
            return Err(Error::NegativeAmount(amount));
        }

        let from = CurrencyCode::parse(from)?;
        let to = CurrencyCode::parse(to)?;

        if from == to {
            tracing::info!("converted {amount} {from} -> {to} = {amount} (same currency)");
            return Ok(amount);
        }

        let rate = self.lookup(&from, &to).await?;
        let converted = round_half_up(amount * rate, RATE_SCALE);
        tracing::info!("converted {amount} {from} -> {to} = {converted} (rate: {rate})");
        Ok(converted)
    }

    async fn lookup(&self, from: &CurrencyCode, to: &CurrencyCode) -> Result<f64, Error> {
        let table = self.source.latest(from).await?;

        let rate = table.rate_for(to).ok_or_else(|| {
            Error::InvalidCurrency(format!("unsupported target currency code: {to}"))
        })?;

        if rate <= 0.0 {
            return Err(Error::Upstream(format!(
                "invalid exchange rate received: {rate}"
            )));
        }

        Ok(rate)
    }
}
