//! Crypto market data ingestion: fetch strategies, a CSV dataset store and
//! the symbol → staleness → fill update pipeline.

pub mod config;
pub mod data;
pub mod domain;
pub mod pipeline;
pub mod policy;
pub mod query;
pub mod timer;

pub use config::{ConfigError, PipelineConfig};
pub use data::{DataError, DatasetStore, MarketDataProvider, SaveOutcome, SymbolCatalog};
pub use domain::{CatalogEntry, Entity, EntityDateInfo, HistoricalBar, MetricSnapshot};
pub use pipeline::{Pipeline, PipelineError, RunReport};
pub use policy::{DailyUpdatePolicy, ForceRefreshPolicy, UpdatePolicy};
pub use query::{Catalog, SearchHit};
pub use timer::OperationTimer;
