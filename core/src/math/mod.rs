pub mod fft;
pub mod fixed;
pub mod matrix;
pub mod stats;

pub use fft::FftHelper;
pub use fixed::Saturation;
pub use matrix::MatrixHelper;
pub use stats::StatsHelper;
