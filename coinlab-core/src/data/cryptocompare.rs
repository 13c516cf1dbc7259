//! CryptoCompare daily history and current quotes.
//!
//! History comes from `/v2/histoday`, quotes from `/pricemultifull`. Every
//! error is logged and degraded to an empty/absent result.

use super::circuit_breaker::CircuitBreaker;
use super::http::{JsonClient, RetryPolicy};
use super::provider::{DataError, MarketDataProvider};
use crate::config::PipelineConfig;
use crate::domain::{HistoricalBar, MetricSnapshot};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
struct HistoDayResponse {
    #[serde(rename = "Response")]
    response: String,
    #[serde(rename = "Message", default)]
    message: String,
    #[serde(rename = "Data", default)]
    data: HistoDayData,
}

#[derive(Debug, Default, Deserialize)]
struct HistoDayData {
    #[serde(rename = "Data", default)]
    rows: Vec<HistoDayRow>,
}

#[derive(Debug, Deserialize)]
struct HistoDayRow {
    time: i64,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volumefrom: f64,
}

#[derive(Debug, Deserialize)]
struct PriceMultiFull {
    #[serde(rename = "RAW", default)]
    raw: HashMap<String, HashMap<String, RawQuote>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
struct RawQuote {
    price: Option<f64>,
    #[serde(rename = "TOTALVOLUME24H")]
    total_volume_24h: Option<f64>,
    #[serde(rename = "HIGH24HOUR")]
    high_24h: Option<f64>,
    #[serde(rename = "LOW24HOUR")]
    low_24h: Option<f64>,
    mktcap: Option<f64>,
}

pub struct CryptoCompareProvider {
    http: JsonClient,
    base_url: String,
    quote_currency: String,
    history_limit: u32,
    pacing: Duration,
}

impl CryptoCompareProvider {
    pub fn new(config: &PipelineConfig) -> Self {
        let breaker = Arc::new(CircuitBreaker::new(config.breaker_cooldown()));
        let retry = RetryPolicy {
            max_retries: config.max_retries,
            base_delay: config.retry_base_delay(),
        };
        Self {
            http: JsonClient::new(config.request_timeout(), breaker, retry),
            base_url: config.market_data_url.trim_end_matches('/').to_string(),
            quote_currency: config.quote_currency.to_uppercase(),
            history_limit: config.history_limit,
            pacing: config.rate_limit_delay(),
        }
    }

    fn request_history(
        &self,
        symbol: &str,
        since: Option<NaiveDate>,
    ) -> Result<Vec<HistoricalBar>, DataError> {
        let url = format!("{}/v2/histoday", self.base_url);
        let resp: HistoDayResponse = self.http.get_json(
            &url,
            &[
                ("fsym", symbol.to_string()),
                ("tsym", self.quote_currency.clone()),
                ("limit", self.history_limit.to_string()),
            ],
        )?;

        if resp.response != "Success" {
            warn!(symbol, message = %resp.message, "provider reported no history");
            return Ok(Vec::new());
        }

        let mut bars = Vec::with_capacity(resp.data.rows.len());
        for row in resp.data.rows {
            let date = chrono::DateTime::from_timestamp(row.time, 0)
                .map(|dt| dt.date_naive())
                .ok_or_else(|| {
                    DataError::ResponseFormatChanged(format!("invalid timestamp: {}", row.time))
                })?;
            if since.is_some_and(|s| date <= s) {
                continue;
            }
            bars.push(HistoricalBar {
                date,
                open: row.open,
                high: row.high,
                low: row.low,
                close: row.close,
                volume: row.volumefrom,
            });
        }
        Ok(bars)
    }

    fn request_snapshot(&self, symbol: &str) -> Result<MetricSnapshot, DataError> {
        let url = format!("{}/pricemultifull", self.base_url);
        let mut resp: PriceMultiFull = self.http.get_json(
            &url,
            &[
                ("fsyms", symbol.to_string()),
                ("tsyms", self.quote_currency.clone()),
            ],
        )?;

        let q = resp
            .raw
            .remove(symbol)
            .and_then(|mut by_currency| by_currency.remove(&self.quote_currency))
            .ok_or_else(|| DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            })?;
        Ok(MetricSnapshot {
            date: Utc::now().date_naive(),
            price: q.price,
            volume_24h: q.total_volume_24h,
            high_24h: q.high_24h,
            low_24h: q.low_24h,
            market_cap: q.mktcap,
        })
    }
}

impl MarketDataProvider for CryptoCompareProvider {
    fn name(&self) -> &str {
        "cryptocompare"
    }

    fn fetch_historical_bars(&self, symbol: &str, since: Option<NaiveDate>) -> Vec<HistoricalBar> {
        let symbol = symbol.to_uppercase();
        let bars = match self.request_history(&symbol, since) {
            Ok(bars) => {
                debug!(symbol = %symbol, rows = bars.len(), "history fetched");
                bars
            }
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "history fetch failed");
                Vec::new()
            }
        };
        if !self.pacing.is_zero() {
            std::thread::sleep(self.pacing);
        }
        bars
    }

    fn fetch_current_snapshot(&self, symbol: &str) -> Option<MetricSnapshot> {
        let symbol = symbol.to_uppercase();
        match self.request_snapshot(&symbol) {
            Ok(snapshot) => Some(snapshot),
            Err(DataError::SymbolNotFound { .. }) => {
                debug!(symbol = %symbol, "no current quote");
                None
            }
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "snapshot fetch failed");
                None
            }
        }
    }

    fn is_available(&self) -> bool {
        self.http.breaker().is_allowed()
    }
}
