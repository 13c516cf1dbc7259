//! Indicator series over a close-price slice.
//!
//! Every function returns a series the same length as its input, with NaN
//! for positions still inside the lookback. A NaN input inside a seed
//! window leaves the whole output NaN.

/// Simple moving average. Lookback: period - 1.
pub fn sma(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    if period == 0 || n < period {
        return result;
    }

    let mut sum: f64 = values[..period].iter().sum();
    result[period - 1] = sum / period as f64;
    for i in period..n {
        sum += values[i] - values[i - period];
        result[i] = sum / period as f64;
    }
    result
}

/// Exponential moving average seeded with the SMA of the first `period`
/// values. Leading NaNs are skipped, so this can smooth another indicator.
pub fn ema(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    let start = values.iter().position(|v| !v.is_nan()).unwrap_or(n);
    if period == 0 || n - start < period {
        return result;
    }

    let seed_end = start + period;
    let seed_window = &values[start..seed_end];
    if seed_window.iter().any(|v| v.is_nan()) {
        return result;
    }
    let alpha = 2.0 / (period as f64 + 1.0);
    let mut prev = seed_window.iter().sum::<f64>() / period as f64;
    result[seed_end - 1] = prev;
    for i in seed_end..n {
        prev = alpha * values[i] + (1.0 - alpha) * prev;
        result[i] = prev;
    }
    result
}

/// Relative strength index with Wilder smoothing.
///
/// avg_loss == 0 → 100, avg_gain == 0 → 0, no movement → 50.
pub fn rsi(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    if period == 0 || n < period + 1 {
        return result;
    }

    let change = |i: usize| values[i] - values[i - 1];
    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;
    for i in 1..=period {
        let ch = change(i);
        if ch.is_nan() {
            return result;
        }
        if ch > 0.0 {
            avg_gain += ch;
        } else {
            avg_loss -= ch;
        }
    }
    avg_gain /= period as f64;
    avg_loss /= period as f64;
    result[period] = rsi_value(avg_gain, avg_loss);

    let alpha = 1.0 / period as f64;
    for i in (period + 1)..n {
        let ch = change(i);
        avg_gain = alpha * ch.max(0.0) + (1.0 - alpha) * avg_gain;
        avg_loss = alpha * (-ch).max(0.0) + (1.0 - alpha) * avg_loss;
        result[i] = rsi_value(avg_gain, avg_loss);
    }
    result
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 && avg_gain == 0.0 {
        50.0
    } else if avg_loss == 0.0 {
        100.0
    } else if avg_gain == 0.0 {
        0.0
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}

/// MACD line, signal line and histogram.
pub struct Macd {
    pub line: Vec<f64>,
    pub signal: Vec<f64>,
    pub histogram: Vec<f64>,
}

pub fn macd(values: &[f64], fast: usize, slow: usize, signal: usize) -> Macd {
    let fast_ema = ema(values, fast);
    let slow_ema = ema(values, slow);
    let line: Vec<f64> = fast_ema.iter().zip(&slow_ema).map(|(f, s)| f - s).collect();
    let signal_line = ema(&line, signal);
    let histogram = line.iter().zip(&signal_line).map(|(l, s)| l - s).collect();
    Macd {
        line,
        signal: signal_line,
        histogram,
    }
}

/// Bollinger bands: SMA ± `multiplier` population standard deviations.
pub struct Bollinger {
    pub middle: Vec<f64>,
    pub upper: Vec<f64>,
    pub lower: Vec<f64>,
}

pub fn bollinger(values: &[f64], period: usize, multiplier: f64) -> Bollinger {
    let middle = sma(values, period);
    let mut upper = vec![f64::NAN; values.len()];
    let mut lower = vec![f64::NAN; values.len()];
    for (i, &mean) in middle.iter().enumerate() {
        if mean.is_nan() {
            continue;
        }
        let window = &values[i + 1 - period..=i];
        let var = window.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / period as f64;
        let band = multiplier * var.sqrt();
        upper[i] = mean + band;
        lower[i] = mean - band;
    }
    Bollinger {
        middle,
        upper,
        lower,
    }
}
