//! Historical OHLCV bar: one calendar day for one entity.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Daily OHLCV bar keyed by calendar date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl HistoricalBar {
    /// True if any OHLCV field is not a finite number.
    pub fn is_void(&self) -> bool {
        !(self.open.is_finite()
            && self.high.is_finite()
            && self.low.is_finite()
            && self.close.is_finite()
            && self.volume.is_finite())
    }

    /// The five model features in fixed order: open, high, low, close, volume.
    pub fn features(&self) -> [f64; 5] {
        [self.open, self.high, self.low, self.close, self.volume]
    }
}
