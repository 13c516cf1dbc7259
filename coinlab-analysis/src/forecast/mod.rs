//! Forecasting engine: scale OHLCV history, window it, train a sequence
//! model, score it on a held-out tail and roll a short forecast forward.
//!
//! Known simplifications:
//! - The scaler is fit on the whole series, test tail included, before the
//!   70/30 split. Test windows therefore share the training normalization.
//! - The multi-step forecast feeds each predicted close back in and holds
//!   open/high/low/volume at their last observed values.

pub mod lstm;
pub mod metrics;
pub mod scaler;
pub mod window;

pub use lstm::LstmRegressor;
pub use scaler::MinMaxScaler;
pub use window::build_windows;

use coinlab_core::HistoricalBar;
use ndarray::{s, Array1, Array2, Array3, Axis};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

/// Feature columns, in order: open, high, low, close, volume.
pub const FEATURES: usize = 5;
/// Index of the close column, the prediction target.
pub const CLOSE: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ForecastError {
    /// Too few usable bars, or a split too short to yield a window.
    #[error("insufficient data")]
    InsufficientData { rows: usize, required: usize },

    #[error("invalid forecast config: {0}")]
    InvalidConfig(String),
}

/// A model mapping `(windows, lookback, features)` to one value per window.
pub trait SequenceRegressor {
    /// Train on `x`/`y`; returns the mean training loss of each epoch.
    fn fit(&mut self, x: &Array3<f64>, y: &Array1<f64>) -> Vec<f64>;

    fn predict(&self, x: &Array3<f64>) -> Array1<f64>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForecastConfig {
    pub lookback: usize,
    pub horizon: usize,
    pub epochs: usize,
    pub batch_size: usize,
    /// Widths of the two recurrent layers.
    pub hidden_units: (usize, usize),
    pub dense_units: usize,
    pub learning_rate: f64,
    pub min_bars: usize,
    pub train_fraction: f64,
    pub seed: u64,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            lookback: 30,
            horizon: 7,
            epochs: 20,
            batch_size: 16,
            hidden_units: (50, 50),
            dense_units: 25,
            learning_rate: 0.001,
            min_bars: 100,
            train_fraction: 0.7,
            seed: 42,
        }
    }
}

impl ForecastConfig {
    pub fn with_lookback(mut self, lookback: usize) -> Self {
        self.lookback = lookback;
        self
    }

    pub fn with_epochs(mut self, epochs: usize) -> Self {
        self.epochs = epochs;
        self
    }

    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn validate(&self) -> Result<(), ForecastError> {
        if self.lookback == 0 || self.horizon == 0 || self.batch_size == 0 {
            return Err(ForecastError::InvalidConfig(
                "lookback, horizon and batch_size must be >= 1".into(),
            ));
        }
        if !(self.train_fraction > 0.0 && self.train_fraction < 1.0) {
            return Err(ForecastError::InvalidConfig(format!(
                "train_fraction must be in (0, 1), got {}",
                self.train_fraction
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastReport {
    pub rmse: f64,
    pub mape: f64,
    pub r2: f64,
    /// Next `horizon` closes, in price units.
    pub future_predictions: Vec<f64>,
}

pub struct ForecastEngine {
    config: ForecastConfig,
}

impl ForecastEngine {
    pub fn new(config: ForecastConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    /// Train the default LSTM on `bars` and forecast.
    pub fn train_and_predict(&self, bars: &[HistoricalBar]) -> Result<ForecastReport, ForecastError> {
        let mut model = LstmRegressor::new(FEATURES, &self.config);
        self.train_and_predict_with(bars, &mut model)
    }

    /// Same as [`train_and_predict`](Self::train_and_predict) with a caller-supplied model.
    pub fn train_and_predict_with<M: SequenceRegressor + ?Sized>(
        &self,
        bars: &[HistoricalBar],
        model: &mut M,
    ) -> Result<ForecastReport, ForecastError> {
        let cfg = &self.config;
        cfg.validate()?;

        let rows: Vec<[f64; FEATURES]> = bars
            .iter()
            .filter(|b| !b.is_void())
            .map(HistoricalBar::features)
            .collect();
        let n = rows.len();
        if n < cfg.min_bars {
            warn!(rows = n, required = cfg.min_bars, "not enough bars to forecast");
            return Err(ForecastError::InsufficientData {
                rows: n,
                required: cfg.min_bars,
            });
        }

        let data = Array2::from_shape_fn((n, FEATURES), |(r, c)| rows[r][c]);
        let scaler = MinMaxScaler::fit(data.view());
        let scaled = scaler.transform(data.view());

        let train_size = (n as f64 * cfg.train_fraction) as usize;
        let (x_train, y_train) = build_windows(scaled.slice(s![..train_size, ..]), cfg.lookback, CLOSE);
        let (x_test, y_test) = build_windows(scaled.slice(s![train_size.., ..]), cfg.lookback, CLOSE);
        if x_train.len_of(Axis(0)) == 0 || x_test.len_of(Axis(0)) == 0 {
            warn!(
                rows = n,
                train_windows = x_train.len_of(Axis(0)),
                test_windows = x_test.len_of(Axis(0)),
                "split too short for the lookback"
            );
            return Err(ForecastError::InsufficientData {
                rows: n,
                required: cfg.min_bars.max(min_rows_for_windows(cfg)),
            });
        }

        let losses = model.fit(&x_train, &y_train);
        debug!(
            windows = x_train.len_of(Axis(0)),
            final_loss = losses.last().copied().unwrap_or(f64::NAN),
            "model trained"
        );

        let predicted = scaler.inverse_column(CLOSE, &model.predict(&x_test));
        let actual = scaler.inverse_column(CLOSE, &y_test);

        let last_window = scaled.slice(s![n - cfg.lookback.., ..]).to_owned();
        let future = roll_forward(model, last_window, cfg.horizon);

        Ok(ForecastReport {
            rmse: metrics::round3(metrics::rmse(&actual, &predicted)),
            mape: metrics::round3(metrics::mape(&actual, &predicted)),
            r2: metrics::round3(metrics::r2(&actual, &predicted)),
            future_predictions: scaler.inverse_column(CLOSE, &future).to_vec(),
        })
    }
}

/// Smallest series length whose test split yields one window.
fn min_rows_for_windows(cfg: &ForecastConfig) -> usize {
    (cfg.lookback..)
        .find(|&n| {
            let train = (n as f64 * cfg.train_fraction) as usize;
            train > cfg.lookback && n - train > cfg.lookback
        })
        .unwrap_or(usize::MAX)
}

/// Predict `horizon` scaled closes, sliding the window over each prediction.
fn roll_forward<M: SequenceRegressor + ?Sized>(
    model: &M,
    mut window: Array2<f64>,
    horizon: usize,
) -> Array1<f64> {
    let (lookback, features) = window.dim();
    let mut out = Array1::zeros(horizon);
    for step in 0..horizon {
        let input = window.clone().insert_axis(Axis(0));
        let pred = model.predict(&input)[0];
        out[step] = pred;

        let mut next_row = window.row(lookback - 1).to_owned();
        next_row[CLOSE] = pred;
        let mut next = Array2::zeros((lookback, features));
        next.slice_mut(s![..lookback - 1, ..])
            .assign(&window.slice(s![1.., ..]));
        next.row_mut(lookback - 1).assign(&next_row);
        window = next;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::cell::Cell;

    /// Predicts the last close of each window; counts fits.
    struct Persistence {
        fits: Cell<usize>,
    }

    impl SequenceRegressor for Persistence {
        fn fit(&mut self, _x: &Array3<f64>, _y: &Array1<f64>) -> Vec<f64> {
            self.fits.set(self.fits.get() + 1);
            Vec::new()
        }

        fn predict(&self, x: &Array3<f64>) -> Array1<f64> {
            let last = x.shape()[1] - 1;
            x.slice(s![.., last, CLOSE]).to_owned()
        }
    }

    fn persistence() -> Persistence {
        Persistence { fits: Cell::new(0) }
    }

    fn linear_bars(n: usize) -> Vec<HistoricalBar> {
        let start = NaiveDate::from_ymd_opt(2022, 1, 1).unwrap();
        (0..n)
            .map(|i| {
                let close = 100.0 + i as f64;
                HistoricalBar {
                    date: start + chrono::Duration::days(i as i64),
                    open: close - 0.5,
                    high: close + 1.0,
                    low: close - 1.0,
                    close,
                    volume: 1000.0 + i as f64,
                }
            })
            .collect()
    }

    #[test]
    fn fewer_than_min_bars_skips_training() {
        let engine = ForecastEngine::new(ForecastConfig::default());
        let mut model = persistence();
        let err = engine
            .train_and_predict_with(&linear_bars(99), &mut model)
            .unwrap_err();
        assert_eq!(err.to_string(), "insufficient data");
        assert_eq!(model.fits.get(), 0);
    }

    #[test]
    fn void_rows_do_not_count() {
        let mut bars = linear_bars(110);
        for bar in bars.iter_mut().take(20) {
            bar.volume = f64::NAN;
        }
        let engine = ForecastEngine::new(ForecastConfig::default());
        let err = engine.train_and_predict_with(&bars, &mut persistence()).unwrap_err();
        assert_eq!(err, ForecastError::InsufficientData { rows: 90, required: 100 });
    }

    #[test]
    fn test_split_shorter_than_lookback_is_insufficient() {
        // 100 rows: 70 train, 30 test, lookback 30 leaves no test window.
        let engine = ForecastEngine::new(ForecastConfig::default());
        let mut model = persistence();
        let err = engine
            .train_and_predict_with(&linear_bars(100), &mut model)
            .unwrap_err();
        assert!(matches!(err, ForecastError::InsufficientData { rows: 100, .. }));
        assert_eq!(model.fits.get(), 0);
    }

    /// Checks windowing, scaling, inversion and scoring end to end with a
    /// model whose error is known exactly. The shipped LSTM with default
    /// settings does not reach this R² on a ramp: the test tail lies above
    /// the training range and the network extrapolates poorly (R² near 0.6
    /// on 300 bars). `tests/forecast_sanity.rs` covers the real model.
    #[test]
    fn linear_series_with_persistence_model_scores_high_r2() {
        let engine = ForecastEngine::new(ForecastConfig::default());
        let mut model = persistence();
        let report = engine
            .train_and_predict_with(&linear_bars(300), &mut model)
            .unwrap();

        assert_eq!(model.fits.get(), 1);
        assert!(report.r2 > 0.95, "r2 = {}", report.r2);
        // Persistence lags a +1/day ramp by exactly one unit.
        assert_eq!(report.rmse, 1.0);
        assert_eq!(report.future_predictions.len(), 7);
        for p in &report.future_predictions {
            assert!((p - 399.0).abs() < 1e-9);
        }
    }

    #[test]
    fn config_rejects_degenerate_split() {
        let cfg = ForecastConfig {
            train_fraction: 1.0,
            ..ForecastConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(ForecastError::InvalidConfig(_))));
    }

    #[test]
    fn min_rows_for_default_windows() {
        assert_eq!(min_rows_for_windows(&ForecastConfig::default()), 101);
    }
}
