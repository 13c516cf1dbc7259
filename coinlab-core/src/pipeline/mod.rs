//! The three-stage update pipeline.
//!
//! Symbol stage → staleness stage → fill stage, run strictly in order on
//! one thread. Only a symbol universe that can be neither fetched nor read
//! from cache aborts a run.

pub mod fill_stage;
pub mod staleness_stage;
pub mod symbol_stage;

pub use fill_stage::{FillStage, FillStats};
pub use staleness_stage::StalenessStage;
pub use symbol_stage::{SymbolStage, ValidityFilter};

use crate::config::PipelineConfig;
use crate::data::{CoinGeckoCatalog, CryptoCompareProvider, DatasetStore, MarketDataProvider, SymbolCatalog};
use crate::policy::{DailyUpdatePolicy, UpdatePolicy};
use crate::timer::OperationTimer;
use serde::Serialize;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("symbol universe unavailable and no cached entity list: {0}")]
    SymbolUniverseUnavailable(String),
}

/// Outcome of one pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub total_symbols: usize,
    pub needs_update: usize,
    pub processed: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: Vec<String>,
    pub elapsed_secs: f64,
    pub symbols_per_second: f64,
}

pub struct Pipeline {
    config: PipelineConfig,
    store: DatasetStore,
    catalog: Box<dyn SymbolCatalog>,
    provider: Box<dyn MarketDataProvider>,
    policy: Box<dyn UpdatePolicy>,
    timer: OperationTimer,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        catalog: Box<dyn SymbolCatalog>,
        provider: Box<dyn MarketDataProvider>,
    ) -> Self {
        Self {
            store: DatasetStore::new(&config.data_dir),
            config,
            catalog,
            provider,
            policy: Box::new(DailyUpdatePolicy::new()),
            timer: OperationTimer::new(),
        }
    }

    /// CoinGecko catalog, CryptoCompare market data, daily update policy.
    pub fn from_config(config: PipelineConfig) -> Self {
        let catalog = Box::new(CoinGeckoCatalog::new(&config));
        let provider = Box::new(CryptoCompareProvider::new(&config));
        Self::new(config, catalog, provider)
    }

    pub fn with_policy(mut self, policy: Box<dyn UpdatePolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn store(&self) -> &DatasetStore {
        &self.store
    }

    pub fn timer(&self) -> &OperationTimer {
        &self.timer
    }

    fn validity_filter(&self) -> ValidityFilter {
        ValidityFilter {
            min_market_cap: self.config.min_market_cap,
            min_volume: self.config.min_volume,
            denylist: self
                .config
                .stable_denylist
                .iter()
                .map(|s| s.to_lowercase())
                .collect(),
            target: self.config.max_entities,
        }
    }

    pub fn run(&self) -> Result<RunReport, PipelineError> {
        let run_scope = self.timer.measure("pipeline");

        let entities = {
            let _scope = self.timer.measure("symbol_stage");
            SymbolStage::new(self.catalog.as_ref(), &self.store, self.validity_filter()).run()?
        };
        info!(entities = entities.len(), "symbol stage completed");

        let infos = {
            let _scope = self.timer.measure("staleness_stage");
            StalenessStage::new(&self.store, self.policy.as_ref()).run(&entities)
        };
        let needs_update = infos.iter().filter(|i| i.needs_update).count();
        info!(needs_update, total = infos.len(), "staleness stage completed");

        let stats = {
            let _scope = self.timer.measure("fill_stage");
            FillStage::new(self.provider.as_ref(), &self.store, self.config.rate_limit_delay())
                .run(&infos)
        };

        let elapsed_secs = run_scope.elapsed().as_secs_f64();
        let total_symbols = entities.len();
        Ok(RunReport {
            total_symbols,
            needs_update,
            processed: stats.processed,
            succeeded: stats.succeeded,
            skipped: stats.skipped,
            failed: stats.failed,
            elapsed_secs,
            symbols_per_second: if elapsed_secs > 0.0 {
                total_symbols as f64 / elapsed_secs
            } else {
                0.0
            },
        })
    }
}
