//! Data layer: remote fetch strategies and the CSV dataset store.

pub mod circuit_breaker;
pub mod coingecko;
pub mod cryptocompare;
pub mod http;
pub mod provider;
pub mod store;

pub use circuit_breaker::CircuitBreaker;
pub use coingecko::CoinGeckoCatalog;
pub use cryptocompare::CryptoCompareProvider;
pub use provider::{DataError, MarketDataProvider, SymbolCatalog};
pub use store::{merge_rows, DatasetStore, Record, SaveOutcome, StoreError, StoreStatus};
