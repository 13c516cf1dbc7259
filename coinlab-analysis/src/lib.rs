//! Analysis over persisted market data: an LSTM price forecaster,
//! technical indicators and on-chain/social sentiment.

pub mod forecast;
pub mod sentiment;
pub mod strategy;
pub mod technical;

pub use forecast::{ForecastConfig, ForecastEngine, ForecastError, ForecastReport, SequenceRegressor};
pub use sentiment::{SentimentAnalyzer, SentimentReport};
pub use strategy::{
    AnalysisReport, AnalysisStrategy, ForecastStrategy, SentimentStrategy, TechnicalStrategy,
};
pub use technical::{scan_technical, TechnicalReport};

use coinlab_core::data::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("insufficient data for {entity}: {rows} usable rows, need {required}")]
    InsufficientData {
        entity: String,
        rows: usize,
        required: usize,
    },

    #[error(transparent)]
    Forecast(#[from] ForecastError),

    #[error("read history: {0}")]
    Store(#[from] StoreError),
}
