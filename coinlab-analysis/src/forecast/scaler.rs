//! Per-column min/max scaling to the unit interval.

use ndarray::{Array1, Array2, ArrayView2, Axis};

/// Min/max scaler fit per column. A constant column scales to 0 and
/// inverts back to its constant.
#[derive(Debug, Clone, PartialEq)]
pub struct MinMaxScaler {
    min: Vec<f64>,
    scale: Vec<f64>,
}

impl MinMaxScaler {
    pub fn fit(data: ArrayView2<'_, f64>) -> Self {
        let mut min = Vec::with_capacity(data.ncols());
        let mut scale = Vec::with_capacity(data.ncols());
        for column in data.axis_iter(Axis(1)) {
            let lo = column.iter().copied().fold(f64::INFINITY, f64::min);
            let hi = column.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let range = hi - lo;
            min.push(lo);
            scale.push(if range > 0.0 { 1.0 / range } else { 1.0 });
        }
        Self { min, scale }
    }

    pub fn transform(&self, data: ArrayView2<'_, f64>) -> Array2<f64> {
        let mut out = data.to_owned();
        for (c, mut column) in out.axis_iter_mut(Axis(1)).enumerate() {
            let (lo, s) = (self.min[c], self.scale[c]);
            column.mapv_inplace(|v| (v - lo) * s);
        }
        out
    }

    /// Map scaled values of one column back to original units.
    pub fn inverse_column(&self, column: usize, values: &Array1<f64>) -> Array1<f64> {
        let (lo, s) = (self.min[column], self.scale[column]);
        values.mapv(|v| v / s + lo)
    }
}
