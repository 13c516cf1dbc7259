//! Regression error metrics.

use ndarray::Array1;

pub fn rmse(actual: &Array1<f64>, predicted: &Array1<f64>) -> f64 {
    let diff = actual - predicted;
    diff.mapv(|d| d * d).mean().unwrap_or(0.0).sqrt()
}

/// Mean absolute percentage error as a fraction (0.05 = 5%). Denominators
/// are floored at machine epsilon.
pub fn mape(actual: &Array1<f64>, predicted: &Array1<f64>) -> f64 {
    let n = actual.len();
    if n == 0 {
        return 0.0;
    }
    let total: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).abs() / a.abs().max(f64::EPSILON))
        .sum();
    total / n as f64
}

/// Coefficient of determination. For a constant target: 1.0 if predicted
/// exactly, else 0.0.
pub fn r2(actual: &Array1<f64>, predicted: &Array1<f64>) -> f64 {
    let mean = actual.mean().unwrap_or(0.0);
    let ss_res: f64 = (actual - predicted).mapv(|d| d * d).sum();
    let ss_tot: f64 = actual.mapv(|a| (a - mean) * (a - mean)).sum();
    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
