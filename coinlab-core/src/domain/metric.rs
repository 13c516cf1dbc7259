//! Daily metric snapshot with current market figures captured once per day.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Point-in-time market metrics for one entity, keyed by calendar date.
///
/// Providers do not always report every figure, so all values are optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSnapshot {
    pub date: NaiveDate,
    pub price: Option<f64>,
    pub volume_24h: Option<f64>,
    pub high_24h: Option<f64>,
    pub low_24h: Option<f64>,
    pub market_cap: Option<f64>,
}
