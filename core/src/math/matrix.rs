use ndarray::{Array2, ArrayView2};

use crate::interface::Sample;

pub struct MatrixHelper;

impl MatrixHelper {
    /// Reference corner turn: (doppler, range) to (range, doppler).
    pub fn transpose(frame: ArrayView2<Sample>) -> Array2<Sample> {
        frame.t().as_standard_layout().into_owned()
    }

    /// Flattens a frame in row-major order.
    pub fn raster(frame: ArrayView2<Sample>) -> Vec<Sample> {
        frame.iter().copied().collect()
    }

    /// Rebuilds a `rows x cols` matrix from a raster-order sequence.
    pub fn from_raster<T: Clone>(rows: usize, cols: usize, values: Vec<T>) -> Option<Array2<T>> {
        Array2::from_shape_vec((rows, cols), values).ok()
    }
}
