//! Analysis strategies: one seam wiring each analyzer to the dataset store.

use crate::forecast::{ForecastConfig, ForecastEngine, ForecastReport};
use crate::sentiment::{SentimentAnalyzer, SentimentReport};
use crate::technical::{self, TechnicalReport};
use crate::AnalysisError;
use coinlab_core::DatasetStore;
use serde::Serialize;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastAnalysis {
    pub entity_id: String,
    #[serde(flatten)]
    pub report: ForecastReport,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum AnalysisReport {
    Forecast(ForecastAnalysis),
    Technical(TechnicalReport),
    Sentiment(SentimentReport),
}

pub trait AnalysisStrategy: Send + Sync {
    fn name(&self) -> &str;

    fn analyze(&self, entity_id: &str) -> Result<AnalysisReport, AnalysisError>;
}

pub struct ForecastStrategy<'a> {
    store: &'a DatasetStore,
    engine: ForecastEngine,
}

impl<'a> ForecastStrategy<'a> {
    pub fn new(store: &'a DatasetStore, config: ForecastConfig) -> Self {
        Self {
            store,
            engine: ForecastEngine::new(config),
        }
    }
}

impl AnalysisStrategy for ForecastStrategy<'_> {
    fn name(&self) -> &str {
        "forecast"
    }

    fn analyze(&self, entity_id: &str) -> Result<AnalysisReport, AnalysisError> {
        let bars = self.store.load_history(entity_id)?;
        info!(entity = entity_id, bars = bars.len(), "training forecast model");
        let report = self.engine.train_and_predict(&bars)?;
        Ok(AnalysisReport::Forecast(ForecastAnalysis {
            entity_id: entity_id.to_string(),
            report,
        }))
    }
}

pub struct TechnicalStrategy<'a> {
    store: &'a DatasetStore,
}

impl<'a> TechnicalStrategy<'a> {
    pub fn new(store: &'a DatasetStore) -> Self {
        Self { store }
    }
}

impl AnalysisStrategy for TechnicalStrategy<'_> {
    fn name(&self) -> &str {
        "technical"
    }

    fn analyze(&self, entity_id: &str) -> Result<AnalysisReport, AnalysisError> {
        let bars = self.store.load_history(entity_id)?;
        technical::analyze(entity_id, &bars).map(AnalysisReport::Technical)
    }
}

#[derive(Default)]
pub struct SentimentStrategy {
    analyzer: SentimentAnalyzer,
}

impl SentimentStrategy {
    pub fn new(analyzer: SentimentAnalyzer) -> Self {
        Self { analyzer }
    }
}

impl AnalysisStrategy for SentimentStrategy {
    fn name(&self) -> &str {
        "sentiment"
    }

    fn analyze(&self, entity_id: &str) -> Result<AnalysisReport, AnalysisError> {
        Ok(AnalysisReport::Sentiment(self.analyzer.analyze(entity_id)))
    }
}
