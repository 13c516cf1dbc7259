//! Sliding-window construction for sequence models.

use ndarray::{s, Array1, Array3, ArrayView2};

/// Overlapping windows of `lookback` rows paired with the `target` column
/// of the row right after each window.
///
/// Returns `x` shaped `(windows, lookback, features)` and `y` shaped
/// `(windows,)`. A series no longer than `lookback` yields zero windows.
pub fn build_windows(
    data: ArrayView2<'_, f64>,
    lookback: usize,
    target: usize,
) -> (Array3<f64>, Array1<f64>) {
    let count = data.nrows().saturating_sub(lookback);
    let mut x = Array3::zeros((count, lookback, data.ncols()));
    let mut y = Array1::zeros(count);
    for i in 0..count {
        x.slice_mut(s![i, .., ..])
            .assign(&data.slice(s![i..i + lookback, ..]));
        y[i] = data[[i + lookback, target]];
    }
    (x, y)
}
