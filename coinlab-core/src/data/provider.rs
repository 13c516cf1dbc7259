//! Fetch-strategy traits and structured error types.
//!
//! Symbol discovery and market-data retrieval are separate capabilities so a
//! catalog and a quote provider can be swapped (or mocked) independently.

use crate::domain::{CatalogEntry, HistoricalBar, MetricSnapshot};
use chrono::NaiveDate;
use thiserror::Error;

/// Structured error types for remote data operations.
///
/// Displayable in CLI context. Only [`SymbolCatalog`] surfaces these to
/// callers; [`MarketDataProvider`] degrades them to empty results.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("rate limited by provider")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("hard stop: data provider has blocked requests (circuit breaker tripped)")]
    CircuitBreakerTripped,
}

/// Source of the ranked candidate entity list.
pub trait SymbolCatalog: Send + Sync {
    fn name(&self) -> &str;

    /// Ranked candidates, paginated until the configured maximum is reached
    /// or the provider runs out. May return up to twice the maximum so the
    /// validity filter has headroom.
    fn fetch_symbol_universe(&self) -> Result<Vec<CatalogEntry>, DataError>;
}

/// Source of daily bars and current metrics for a symbol.
///
/// Implementations catch transport and schema errors, log them and return
/// empty/absent results; callers never see a transport error.
pub trait MarketDataProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Daily bars strictly after `since` (all available history when `None`),
    /// ascending by date. Empty when the provider has nothing.
    fn fetch_historical_bars(&self, symbol: &str, since: Option<NaiveDate>) -> Vec<HistoricalBar>;

    /// Today's metric snapshot, or `None` when unavailable.
    fn fetch_current_snapshot(&self, symbol: &str) -> Option<MetricSnapshot>;

    /// False while the provider is refusing every request (circuit breaker
    /// open after an access ban). The fill stage stops calling it then.
    fn is_available(&self) -> bool {
        true
    }
}
