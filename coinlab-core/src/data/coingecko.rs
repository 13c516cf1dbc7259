//! CoinGecko ranked market catalog.

use super::circuit_breaker::CircuitBreaker;
use super::http::{JsonClient, RetryPolicy};
use super::provider::{DataError, SymbolCatalog};
use crate::config::PipelineConfig;
use crate::domain::CatalogEntry;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Pages through `/coins/markets` ordered by market cap.
pub struct CoinGeckoCatalog {
    http: JsonClient,
    base_url: String,
    max_entities: usize,
    page_size: u32,
    page_delay: Duration,
}

impl CoinGeckoCatalog {
    pub fn new(config: &PipelineConfig) -> Self {
        let breaker = Arc::new(CircuitBreaker::new(config.breaker_cooldown()));
        let retry = RetryPolicy {
            max_retries: config.max_retries,
            base_delay: config.retry_base_delay(),
        };
        Self {
            http: JsonClient::new(config.request_timeout(), breaker, retry),
            base_url: config.catalog_url.trim_end_matches('/').to_string(),
            max_entities: config.max_entities,
            page_size: config.page_size,
            page_delay: config.page_delay(),
        }
    }

    fn fetch_page(&self, page: u32) -> Result<Vec<CatalogEntry>, DataError> {
        let url = format!("{}/coins/markets", self.base_url);
        self.http.get_json(
            &url,
            &[
                ("vs_currency", "usd".to_string()),
                ("order", "market_cap_desc".to_string()),
                ("per_page", self.page_size.to_string()),
                ("page", page.to_string()),
                ("sparkline", "false".to_string()),
            ],
        )
    }
}

impl SymbolCatalog for CoinGeckoCatalog {
    fn name(&self) -> &str {
        "coingecko"
    }

    fn fetch_symbol_universe(&self) -> Result<Vec<CatalogEntry>, DataError> {
        let mut entries: Vec<CatalogEntry> = Vec::new();
        let mut page = 1;

        while entries.len() < self.max_entities {
            match self.fetch_page(page) {
                Ok(rows) if rows.is_empty() => break,
                Ok(rows) => {
                    info!(page, rows = rows.len(), "catalog page fetched");
                    entries.extend(rows);
                }
                Err(e) if entries.is_empty() => return Err(e),
                Err(e) => {
                    warn!(page, error = %e, kept = entries.len(), "catalog paging stopped early");
                    break;
                }
            }
            page += 1;
            if entries.len() < self.max_entities && !self.page_delay.is_zero() {
                std::thread::sleep(self.page_delay);
            }
        }

        entries.truncate(self.max_entities * 2);
        Ok(entries)
    }
}
