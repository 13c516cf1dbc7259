//! Technical indicator analysis over an entity's daily history.

pub mod indicators;

use crate::AnalysisError;
use chrono::NaiveDate;
use coinlab_core::{DatasetStore, HistoricalBar};
use rayon::prelude::*;
use serde::Serialize;
use tracing::info;

/// Minimum cleaned bars before indicators are computed.
pub const MIN_BARS: usize = 50;
/// Rows included in a report, counted back from the latest.
pub const REPORT_ROWS: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorRow {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub sma_20: Option<f64>,
    pub sma_50: Option<f64>,
    pub ema_12: Option<f64>,
    pub ema_26: Option<f64>,
    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
    pub macd_histogram: Option<f64>,
    pub rsi_14: Option<f64>,
    pub bb_upper: Option<f64>,
    pub bb_middle: Option<f64>,
    pub bb_lower: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Bullish,
    Bearish,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RsiZone {
    Overbought,
    Oversold,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MacdBias {
    Bullish,
    Bearish,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TechnicalSummary {
    pub trend: Trend,
    pub rsi_zone: Option<RsiZone>,
    pub macd_bias: Option<MacdBias>,
    pub last_close: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TechnicalReport {
    pub entity_id: String,
    pub data_points: usize,
    pub rows: Vec<IndicatorRow>,
    pub latest: IndicatorRow,
    pub summary: TechnicalSummary,
}

/// Drop bars whose OHLC are all zero or contain a NaN.
pub fn clean(bars: &[HistoricalBar]) -> Vec<HistoricalBar> {
    bars.iter()
        .filter(|b| {
            let ohlc = [b.open, b.high, b.low, b.close];
            !ohlc.iter().any(|v| v.is_nan()) && ohlc.iter().any(|v| *v != 0.0)
        })
        .cloned()
        .collect()
}

fn finite(v: f64) -> Option<f64> {
    v.is_finite().then_some(v)
}

pub fn analyze(entity_id: &str, bars: &[HistoricalBar]) -> Result<TechnicalReport, AnalysisError> {
    let bars = clean(bars);
    if bars.len() < MIN_BARS {
        return Err(AnalysisError::InsufficientData {
            entity: entity_id.to_string(),
            rows: bars.len(),
            required: MIN_BARS,
        });
    }

    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let sma_20 = indicators::sma(&closes, 20);
    let sma_50 = indicators::sma(&closes, 50);
    let ema_12 = indicators::ema(&closes, 12);
    let ema_26 = indicators::ema(&closes, 26);
    let macd = indicators::macd(&closes, 12, 26, 9);
    let rsi_14 = indicators::rsi(&closes, 14);
    let bands = indicators::bollinger(&closes, 20, 2.0);

    let mut rows: Vec<IndicatorRow> = bars
        .iter()
        .enumerate()
        .map(|(i, b)| IndicatorRow {
            date: b.date,
            open: b.open,
            high: b.high,
            low: b.low,
            close: b.close,
            volume: b.volume,
            sma_20: finite(sma_20[i]),
            sma_50: finite(sma_50[i]),
            ema_12: finite(ema_12[i]),
            ema_26: finite(ema_26[i]),
            macd: finite(macd.line[i]),
            macd_signal: finite(macd.signal[i]),
            macd_histogram: finite(macd.histogram[i]),
            rsi_14: finite(rsi_14[i]),
            bb_upper: finite(bands.upper[i]),
            bb_middle: finite(bands.middle[i]),
            bb_lower: finite(bands.lower[i]),
        })
        .collect();

    let data_points = rows.len();
    let rows = rows.split_off(data_points.saturating_sub(REPORT_ROWS));
    let latest = rows[rows.len() - 1].clone();
    let summary = summarize(&latest);

    Ok(TechnicalReport {
        entity_id: entity_id.to_string(),
        data_points,
        rows,
        latest,
        summary,
    })
}

fn summarize(row: &IndicatorRow) -> TechnicalSummary {
    let trend = match (row.sma_20, row.sma_50) {
        (Some(s20), Some(s50)) if row.close > s50 && s20 > s50 => Trend::Bullish,
        (Some(s20), Some(s50)) if row.close < s50 && s20 < s50 => Trend::Bearish,
        _ => Trend::Neutral,
    };
    let rsi_zone = row.rsi_14.map(|r| {
        if r > 70.0 {
            RsiZone::Overbought
        } else if r < 30.0 {
            RsiZone::Oversold
        } else {
            RsiZone::Neutral
        }
    });
    let macd_bias = match (row.macd, row.macd_signal) {
        (Some(m), Some(s)) if m > s => Some(MacdBias::Bullish),
        (Some(_), Some(_)) => Some(MacdBias::Bearish),
        _ => None,
    };
    TechnicalSummary {
        trend,
        rsi_zone,
        macd_bias,
        last_close: row.close,
    }
}

/// Analyze many entities in parallel. Read-only against the store.
pub fn scan_technical(
    store: &DatasetStore,
    ids: &[String],
) -> Vec<(String, Result<TechnicalReport, AnalysisError>)> {
    let results: Vec<_> = ids
        .par_iter()
        .map(|id| {
            let report = store
                .load_history(id)
                .map_err(AnalysisError::from)
                .and_then(|bars| analyze(id, &bars));
            (id.clone(), report)
        })
        .collect();
    info!(
        entities = ids.len(),
        ok = results.iter().filter(|(_, r)| r.is_ok()).count(),
        "technical scan complete"
    );
    results
}
