pub mod cfar;
pub mod corner_turner;
pub mod doppler_notch;
pub mod fft_engine;
pub mod magnitude;
pub mod window;

pub use cfar::AdaptiveCfar;
pub use corner_turner::CornerTurner;
pub use doppler_notch::DopplerNotch;
pub use fft_engine::{FftEngine, StreamingFft};
pub use magnitude::MagnitudeEstimator;
pub use window::{CoefficientWindow, WindowMultiplier};
